use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use super::{question_key, validate_entry, AnswerStore, StoreError};
use crate::models::answer::AnswerRow;

#[derive(Clone)]
pub struct PgAnswerStore {
    pool: PgPool,
}

impl PgAnswerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnswerStore for PgAnswerStore {
    async fn find(&self, question: &str) -> Result<Option<Value>, StoreError> {
        let answer: Option<Value> = sqlx::query_scalar("SELECT answer FROM answers WHERE id = $1")
            .bind(question_key(question))
            .fetch_optional(&self.pool)
            .await?;
        Ok(answer)
    }

    /// Upserts: saving a known question replaces its answer.
    async fn save(&self, question: &str, answer: &Value) -> Result<AnswerRow, StoreError> {
        let question = validate_entry(question, answer)?;
        let id = question_key(question);

        let row: AnswerRow = sqlx::query_as(
            r#"
            INSERT INTO answers (id, question, answer)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET answer = EXCLUDED.answer,
                    updated_at = NOW()
            RETURNING id, question, answer, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(question)
        .bind(answer)
        .fetch_one(&self.pool)
        .await?;

        debug!("Stored answer {id}");
        Ok(row)
    }
}
