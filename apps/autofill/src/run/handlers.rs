use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ApplicationRunner, PreviewRequest, RunFailure, RunPlan, RunRequest, RunResult};
use crate::browser::SessionLauncher;
use crate::errors::AppError;
use crate::form::extractor::QuestionRecord;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub questions: Vec<QuestionRecord>,
    pub error: Option<String>,
}

/// POST /api/v1/runs
pub async fn handle_run(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunResult>), AppError> {
    let plan = RunPlan::new(&req, state.runner.settings())
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let dry_run = plan.dry_run;

    let (cancel, runner, launcher) = run_handles(&state);
    // Dropping the request (client gone) cancels the run; it still closes its page.
    let _guard = cancel.clone().drop_guard();
    let task: JoinHandle<Result<RunResult, RunFailure>> =
        tokio::spawn(async move { runner.run(launcher.as_ref(), plan, &cancel).await });

    match task.await.map_err(|e| AppError::Internal(e.into()))? {
        Ok(result) => Ok((StatusCode::OK, Json(result))),
        Err(failure) => Ok((
            StatusCode::BAD_GATEWAY,
            Json(RunResult::failed(dry_run, &failure)),
        )),
    }
}

/// POST /api/v1/runs/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<(StatusCode, Json<PreviewResponse>), AppError> {
    let plan = RunPlan::preview(&req, state.runner.settings())
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (cancel, runner, launcher) = run_handles(&state);
    let _guard = cancel.clone().drop_guard();
    let task = tokio::spawn(async move { runner.preview(launcher.as_ref(), plan, &cancel).await });

    match task.await.map_err(|e| AppError::Internal(e.into()))? {
        Ok(questions) => Ok((
            StatusCode::OK,
            Json(PreviewResponse {
                success: true,
                questions,
                error: None,
            }),
        )),
        Err(failure) => Ok((
            StatusCode::BAD_GATEWAY,
            Json(PreviewResponse {
                success: false,
                questions: Vec::new(),
                error: Some(failure.to_string()),
            }),
        )),
    }
}

/// Owned handles for a spawned run. The token is a child of the service
/// shutdown token.
fn run_handles(
    state: &AppState,
) -> (
    CancellationToken,
    Arc<ApplicationRunner>,
    Arc<dyn SessionLauncher>,
) {
    (
        state.shutdown.child_token(),
        Arc::clone(&state.runner),
        Arc::clone(&state.launcher),
    )
}
