pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::answers::handlers as answers;
use crate::run::handlers as runs;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Runs
        .route("/api/v1/runs", post(runs::handle_run))
        .route("/api/v1/runs/preview", post(runs::handle_preview))
        // Answer store
        .route(
            "/api/v1/answers",
            get(answers::handle_get_answer).post(answers::handle_save_answer),
        )
        .with_state(state)
}
