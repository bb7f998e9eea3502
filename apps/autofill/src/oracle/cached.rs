use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AnswerOracle, OracleAnswer, OracleError};
use crate::answers::AnswerStore;
use crate::form::extractor::truncate;

/// Serves stored answers first and remembers freshly generated ones.
///
/// The store is advisory: lookup failures fall through to generation and
/// write failures are logged and dropped.
pub struct CachedOracle<O> {
    store: Arc<dyn AnswerStore>,
    inner: O,
}

impl<O: AnswerOracle> CachedOracle<O> {
    pub fn new(store: Arc<dyn AnswerStore>, inner: O) -> Self {
        Self { store, inner }
    }

    async fn lookup(&self, question: &str) -> Option<OracleAnswer> {
        let value = match self.store.find(question).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!("Answer lookup failed for '{}': {e}", truncate(question));
                return None;
            }
        };

        match serde_json::from_value::<OracleAnswer>(value) {
            Ok(answer) if !answer.text().trim().is_empty() => Some(answer),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring malformed stored answer for '{}': {e}", truncate(question));
                None
            }
        }
    }

    async fn remember(&self, question: &str, answer: &OracleAnswer) {
        if answer.text().trim().is_empty() {
            return;
        }

        let value = match serde_json::to_value(answer) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize answer for storage: {e}");
                return;
            }
        };

        if let Err(e) = self.store.save(question, &value).await {
            warn!("Failed to store answer for '{}': {e}", truncate(question));
        }
    }
}

#[async_trait]
impl<O: AnswerOracle> AnswerOracle for CachedOracle<O> {
    async fn resolve(&self, question: &str) -> Result<OracleAnswer, OracleError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(OracleAnswer::Text(String::new()));
        }

        if let Some(answer) = self.lookup(question).await {
            debug!("Using stored answer for '{}'", truncate(question));
            return Ok(answer);
        }

        let answer = self.inner.resolve(question).await?;
        self.remember(question, &answer).await;
        Ok(answer)
    }
}
