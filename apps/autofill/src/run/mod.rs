//! Flow Orchestrator: one application run from navigation to submission.
//!
//! `RunPlan` is the validated form of a request. It is built before any
//! browser work so bad URLs and broken patterns never open a session.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::BrowserError;
use crate::config::Config;
use crate::form::patterns::{CompiledPatterns, ExtractionPatterns, PatternError};

pub mod evidence;
pub mod flow;
pub mod handlers;

pub use flow::ApplicationRunner;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidPatterns(#[from] PatternError),

    #[error("Could not open a browser session: {0}")]
    Session(#[source] BrowserError),

    #[error("Navigation to {url} failed after {attempts} attempt(s): {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },

    #[error("Could not read the page: {0}")]
    Snapshot(#[source] BrowserError),

    #[error("Submission failed: {0}")]
    Submission(#[source] BrowserError),

    #[error("Run cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Navigated,
    Cleared,
    Extracted,
    Answered,
    DryRunComplete,
    Submitted,
    Closed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Navigated => "navigated",
            RunState::Cleared => "cleared",
            RunState::Extracted => "extracted",
            RunState::Answered => "answered",
            RunState::DryRunComplete => "dry_run_complete",
            RunState::Submitted => "submitted",
            RunState::Closed => "closed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A run that ended in `Failed`. `state` is the last state reached before
/// the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: RunError,
    pub state: RunState,
    pub evidence_path: Option<PathBuf>,
}

fn default_dry_run() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub job_url: String,
    /// Submission is opt-in.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub navigation_timeout_ms: Option<u64>,
    #[serde(default)]
    pub action_timeout_ms: Option<u64>,
    #[serde(default)]
    pub selectors: Option<ExtractionPatterns>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub job_url: String,
    #[serde(default)]
    pub selectors: Option<ExtractionPatterns>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub dry_run: bool,
    pub questions_found: usize,
    pub evidence_path: Option<String>,
    pub error: Option<String>,
}

impl RunResult {
    pub fn completed(dry_run: bool, questions_found: usize, evidence: Option<PathBuf>) -> Self {
        Self {
            success: true,
            dry_run,
            questions_found,
            evidence_path: evidence.map(|p| p.display().to_string()),
            error: None,
        }
    }

    pub fn failed(dry_run: bool, failure: &RunFailure) -> Self {
        Self {
            success: false,
            dry_run,
            questions_found: 0,
            evidence_path: failure
                .evidence_path
                .as_ref()
                .map(|p| p.display().to_string()),
            error: Some(failure.error.to_string()),
        }
    }
}

/// Service-wide defaults for every run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    pub visibility_timeout: Duration,
    pub question_wait: Duration,
    pub interstitial_timeout: Duration,
    pub submit_timeout: Duration,
    pub submit_settle_timeout: Duration,
    pub typing_delay: Duration,
    /// Navigation attempts, including the first.
    pub retries: u32,
    /// Base delay between navigation attempts; doubles each time.
    pub backoff: Duration,
    pub evidence_dir: PathBuf,
    pub min_confidence: f32,
    pub patterns: ExtractionPatterns,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation_timeout: Duration::from_millis(config.nav_timeout_ms),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            visibility_timeout: Duration::from_millis(config.visibility_timeout_ms),
            question_wait: Duration::from_millis(config.question_wait_ms),
            interstitial_timeout: Duration::from_millis(config.interstitial_timeout_ms),
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            submit_settle_timeout: Duration::from_millis(config.submit_settle_timeout_ms),
            typing_delay: Duration::from_millis(config.typing_delay_ms),
            retries: config.automation_retries,
            backoff: Duration::from_millis(config.automation_backoff_ms),
            evidence_dir: config.screenshot_dir.clone(),
            min_confidence: config.ai_require_confidence,
            patterns: ExtractionPatterns::for_profile(config.form_profile),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            action_timeout: Duration::from_secs(30),
            visibility_timeout: Duration::from_secs(5),
            question_wait: Duration::from_secs(10),
            interstitial_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(15),
            submit_settle_timeout: Duration::from_secs(60),
            typing_delay: Duration::from_millis(20),
            retries: 3,
            backoff: Duration::from_millis(750),
            evidence_dir: PathBuf::from("screenshots"),
            min_confidence: 0.65,
            patterns: ExtractionPatterns::default(),
        }
    }
}

/// Effective parameters of one run: request overrides applied on top of
/// the service settings, patterns compiled.
#[derive(Debug)]
pub struct RunPlan {
    pub job_url: String,
    pub dry_run: bool,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    pub patterns: ExtractionPatterns,
    pub(crate) compiled: CompiledPatterns,
}

impl RunPlan {
    pub fn new(request: &RunRequest, settings: &RunSettings) -> Result<Self, RunError> {
        let job_url = validate_url(&request.job_url)?;
        let navigation_timeout =
            override_timeout("navigationTimeoutMs", request.navigation_timeout_ms)?
                .unwrap_or(settings.navigation_timeout);
        let action_timeout = override_timeout("actionTimeoutMs", request.action_timeout_ms)?
            .unwrap_or(settings.action_timeout);
        let patterns = request
            .selectors
            .clone()
            .unwrap_or_else(|| settings.patterns.clone());
        let compiled = patterns.compile()?;

        Ok(Self {
            job_url,
            dry_run: request.dry_run,
            navigation_timeout,
            action_timeout,
            patterns,
            compiled,
        })
    }

    /// Extraction-only plan. Never submits.
    pub fn preview(request: &PreviewRequest, settings: &RunSettings) -> Result<Self, RunError> {
        Self::new(
            &RunRequest {
                job_url: request.job_url.clone(),
                dry_run: true,
                navigation_timeout_ms: None,
                action_timeout_ms: None,
                selectors: request.selectors.clone(),
            },
            settings,
        )
    }
}

fn validate_url(raw: &str) -> Result<String, RunError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RunError::InvalidRequest("jobUrl is required".to_string()));
    }

    let url = Url::parse(raw)
        .map_err(|e| RunError::InvalidRequest(format!("jobUrl '{raw}' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(RunError::InvalidRequest(format!(
            "jobUrl must be http(s), got '{scheme}'"
        ))),
    }
}

fn override_timeout(name: &str, value: Option<u64>) -> Result<Option<Duration>, RunError> {
    match value {
        Some(0) => Err(RunError::InvalidRequest(format!("{name} must be positive"))),
        Some(ms) => Ok(Some(Duration::from_millis(ms))),
        None => Ok(None),
    }
}
