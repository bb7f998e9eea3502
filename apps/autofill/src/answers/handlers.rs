use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: Value,
}

#[derive(Debug, Serialize)]
pub struct SavedAnswerResponse {
    pub id: String,
    pub question: String,
    pub answer: Value,
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    #[serde(default)]
    pub question: String,
}

/// POST /api/v1/answers
pub async fn handle_save_answer(
    State(state): State<AppState>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<(StatusCode, Json<SavedAnswerResponse>), AppError> {
    let row = state.answers.save(&req.question, &req.answer).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedAnswerResponse {
            id: row.id,
            question: row.question,
            answer: row.answer,
        }),
    ))
}

/// GET /api/v1/answers?question=...
pub async fn handle_get_answer(
    State(state): State<AppState>,
    Query(params): Query<QuestionQuery>,
) -> Result<Json<Value>, AppError> {
    let question = params.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question text is required".to_string()));
    }

    let answer = state
        .answers
        .find(question)
        .await?
        .ok_or_else(|| AppError::NotFound("No stored answer for this question".to_string()))?;

    Ok(Json(json!({ "answer": answer })))
}
