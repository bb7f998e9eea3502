//! Document Access Port: the only way the form core touches a live page.
//!
//! The core never reaches into a browser directly. It asks a `BrowserPage`
//! for a snapshot of the current document (extraction runs over that
//! snapshot) and performs discrete interactions by reference string.
//!
//! Sessions are explicit: a `SessionLauncher` hands out one exclusively owned
//! page per run, and the run is responsible for closing it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod chrome;
#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("No element matches '{0}'")]
    NotFound(String),

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Element '{selector}' is not a {expected}")]
    WrongElement { selector: String, expected: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("CDP error: {0}")]
    Protocol(String),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

/// A single `<option>` of a choice control, as the page reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// An open page owned by exactly one run.
///
/// Every interaction takes a reference string produced by the selector
/// synthesizer. When the reference matches more than one element the
/// implementation acts on the first match.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates and waits for the load to settle, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Serialized HTML of the document as it is right now.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Select-all followed by delete.
    async fn clear(&self, selector: &str) -> Result<(), BrowserError>;

    /// Types `text` one character at a time, sleeping `delay` between keys.
    async fn type_text(&self, selector: &str, text: &str, delay: Duration)
        -> Result<(), BrowserError>;

    async fn choice_options(&self, selector: &str) -> Result<Vec<ChoiceOption>, BrowserError>;

    /// Sets the control's value and fires its native `change` notification.
    async fn select_choice(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Full-page PNG written to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;

    /// Releases the page and the session behind it.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Hands out fresh, exclusively owned pages. One call per run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;
}
