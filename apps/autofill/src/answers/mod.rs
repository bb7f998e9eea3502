//! Persisted question → answer pairs.
//!
//! Questions are keyed by the SHA-256 of their trimmed text so the same
//! question asked on two postings maps to one row.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::answer::AnswerRow;

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod store;

pub use store::PgAnswerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn find(&self, question: &str) -> Result<Option<Value>, StoreError>;
    async fn save(&self, question: &str, answer: &Value) -> Result<AnswerRow, StoreError>;
}

/// Lowercase hex SHA-256 of the trimmed question.
pub fn question_key(question: &str) -> String {
    hex::encode(Sha256::digest(question.trim().as_bytes()))
}

/// Checks a `(question, answer)` pair before it is stored and returns the
/// trimmed question.
pub fn validate_entry<'a>(question: &'a str, answer: &Value) -> Result<&'a str, StoreError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(StoreError::Invalid("Question text is required".to_string()));
    }

    match answer {
        Value::String(text) if !text.trim().is_empty() => Ok(question),
        Value::Object(_) => Ok(question),
        _ => Err(StoreError::Invalid(
            "Answer must be a non-empty string or an object".to_string(),
        )),
    }
}
