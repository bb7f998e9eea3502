use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::prompts::{build_answer_prompt, ANSWER_SYSTEM};
use super::{AnswerOracle, OracleAnswer, OracleError};
use crate::llm_client::LlmClient;

/// Shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct GeneratedAnswer {
    answer: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Generates answers with the LLM, optionally grounded in applicant context.
pub struct LlmOracle {
    llm: LlmClient,
    applicant_context: Option<String>,
}

impl LlmOracle {
    pub fn new(llm: LlmClient, applicant_context: Option<String>) -> Self {
        Self {
            llm,
            applicant_context,
        }
    }
}

#[async_trait]
impl AnswerOracle for LlmOracle {
    async fn resolve(&self, question: &str) -> Result<OracleAnswer, OracleError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(OracleAnswer::Text(String::new()));
        }

        let prompt = build_answer_prompt(question, self.applicant_context.as_deref());
        let generated: GeneratedAnswer = self.llm.call_json(&prompt, ANSWER_SYSTEM).await?;

        debug!(
            "Generated answer (confidence: {:?})",
            generated.confidence
        );

        Ok(OracleAnswer::Structured {
            text: generated.answer,
            confidence: generated.confidence,
            reasoning: generated.reasoning,
        })
    }
}
