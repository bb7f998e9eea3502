use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::browser::{BrowserError, BrowserPage};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Could not create evidence directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Capture(#[from] BrowserError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceTag {
    DryRun,
    Submitted,
    Error,
}

impl fmt::Display for EvidenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvidenceTag::DryRun => "dryrun",
            EvidenceTag::Submitted => "submitted",
            EvidenceTag::Error => "error",
        })
    }
}

/// Directory that full-page snapshots are written to. Created on first use.
#[derive(Debug, Clone)]
pub struct EvidenceDir {
    root: PathBuf,
}

impl EvidenceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<tag>_<YYYY-MM-DD_HH-MM-SS>_<run>.png`. The run suffix keeps
    /// concurrent runs from overwriting each other within the same second.
    pub fn path_for(&self, tag: EvidenceTag, run_id: Uuid, at: DateTime<Utc>) -> PathBuf {
        let run = run_id.simple().to_string();
        self.root.join(format!(
            "{tag}_{}_{}.png",
            at.format("%Y-%m-%d_%H-%M-%S"),
            &run[..8]
        ))
    }

    pub async fn capture(
        &self,
        page: &dyn BrowserPage,
        tag: EvidenceTag,
        run_id: Uuid,
    ) -> Result<PathBuf, EvidenceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| EvidenceError::Directory {
                path: self.root.clone(),
                source,
            })?;

        let path = self.path_for(tag, run_id, Utc::now());
        page.screenshot(&path).await?;
        Ok(path)
    }
}
