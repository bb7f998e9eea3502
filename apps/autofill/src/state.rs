use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::answers::AnswerStore;
use crate::browser::SessionLauncher;
use crate::run::ApplicationRunner;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub answers: Arc<dyn AnswerStore>,
    pub runner: Arc<ApplicationRunner>,
    /// Opens one dedicated browser session per run.
    pub launcher: Arc<dyn SessionLauncher>,
    /// Cancelled on shutdown; every run holds a child token.
    pub shutdown: CancellationToken,
}
