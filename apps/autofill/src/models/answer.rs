use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerRow {
    pub id: String,
    pub question: String,
    pub answer: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
