//! In-memory `AnswerStore` keyed the same way as the Postgres table.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::answers::{question_key, validate_entry, AnswerStore, StoreError};
use crate::models::answer::AnswerRow;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Value>>,
    broken: bool,
}

impl MemoryStore {
    /// Every call fails as if the pool were gone.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn with(question: &str, answer: Value) -> Self {
        let store = Self::default();
        store
            .rows
            .lock()
            .unwrap()
            .insert(question_key(question), answer);
        store
    }

    pub fn get(&self, question: &str) -> Option<Value> {
        self.rows.lock().unwrap().get(&question_key(question)).cloned()
    }
}

#[async_trait]
impl AnswerStore for MemoryStore {
    async fn find(&self, question: &str) -> Result<Option<Value>, StoreError> {
        if self.broken {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self.get(question))
    }

    async fn save(&self, question: &str, answer: &Value) -> Result<AnswerRow, StoreError> {
        if self.broken {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let question = validate_entry(question, answer)?;
        let id = question_key(question);
        self.rows.lock().unwrap().insert(id.clone(), answer.clone());
        Ok(AnswerRow {
            id,
            question: question.to_string(),
            answer: answer.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}
