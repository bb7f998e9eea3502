//! Answer oracle adapter: turns question text into answer text.
//!
//! Oracles may answer with plain text or with a structured payload carrying a
//! confidence and reasoning. Both shapes are normalized to a single
//! `Option<String>` by `normalize_answer` before anything reaches a form.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::LlmError;

pub mod cached;
pub mod llm;
pub mod prompts;

pub use cached::CachedOracle;
pub use llm::LlmOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Answer generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Oracle returned an invalid answer: {0}")]
    InvalidShape(String),
}

/// What an oracle hands back. The structured form is also the stored form
/// (`{"answer", "confidence", "reasoning"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OracleAnswer {
    Text(String),
    Structured {
        #[serde(rename = "answer", alias = "text")]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
}

impl OracleAnswer {
    pub fn text(&self) -> &str {
        match self {
            OracleAnswer::Text(text) => text,
            OracleAnswer::Structured { text, .. } => text,
        }
    }
}

#[async_trait]
pub trait AnswerOracle: Send + Sync {
    async fn resolve(&self, question: &str) -> Result<OracleAnswer, OracleError>;
}

/// Collapses an oracle result to the text to write, or `None` for "no answer".
///
/// Rejections, blank text, confidences outside `0..=1` and confidences below
/// `min_confidence` all count as no answer.
pub fn normalize_answer(
    result: Result<OracleAnswer, OracleError>,
    min_confidence: f32,
) -> Option<String> {
    let answer = result.ok()?;

    if let OracleAnswer::Structured {
        confidence: Some(confidence),
        ..
    } = &answer
    {
        if !(0.0..=1.0).contains(confidence) || *confidence < min_confidence {
            return None;
        }
    }

    let text = answer.text().trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(text: &str, confidence: Option<f32>) -> OracleAnswer {
        OracleAnswer::Structured {
            text: text.to_string(),
            confidence,
            reasoning: None,
        }
    }

    #[test]
    fn test_plain_text_is_trimmed() {
        let result = Ok(OracleAnswer::Text("  Yes \n".to_string()));
        assert_eq!(normalize_answer(result, 0.65).as_deref(), Some("Yes"));
    }

    #[test]
    fn test_blank_answers_are_no_answer() {
        assert!(normalize_answer(Ok(OracleAnswer::Text(String::new())), 0.0).is_none());
        assert!(normalize_answer(Ok(structured("   ", Some(0.9))), 0.0).is_none());
    }

    #[test]
    fn test_rejection_is_no_answer() {
        let result = Err(OracleError::InvalidShape("not-an-object".to_string()));
        assert!(normalize_answer(result, 0.0).is_none());
    }

    #[test]
    fn test_low_confidence_is_no_answer() {
        assert!(normalize_answer(Ok(structured("Maybe", Some(0.4))), 0.65).is_none());
        assert_eq!(
            normalize_answer(Ok(structured("Sure", Some(0.65))), 0.65).as_deref(),
            Some("Sure")
        );
    }

    #[test]
    fn test_missing_confidence_is_accepted() {
        assert_eq!(
            normalize_answer(Ok(structured("Sure", None)), 0.65).as_deref(),
            Some("Sure")
        );
    }

    #[test]
    fn test_out_of_range_confidence_is_invalid() {
        assert!(normalize_answer(Ok(structured("Sure", Some(1.5))), 0.0).is_none());
        assert!(normalize_answer(Ok(structured("Sure", Some(f32::NAN))), 0.0).is_none());
    }

    #[test]
    fn test_deserializes_both_shapes() {
        let text: OracleAnswer = serde_json::from_str(r#""Yes""#).unwrap();
        assert_eq!(text, OracleAnswer::Text("Yes".to_string()));

        let structured: OracleAnswer = serde_json::from_str(
            r#"{"answer": "3 years", "confidence": 0.9, "reasoning": "resume"}"#,
        )
        .unwrap();
        assert_eq!(structured.text(), "3 years");

        let aliased: OracleAnswer = serde_json::from_str(r#"{"text": "Remote"}"#).unwrap();
        assert_eq!(aliased.text(), "Remote");
    }

    #[test]
    fn test_invalid_shapes_do_not_deserialize() {
        assert!(serde_json::from_str::<OracleAnswer>(r#"{"answer": 42}"#).is_err());
        assert!(serde_json::from_str::<OracleAnswer>(r#"{"reasoning": "x"}"#).is_err());
        assert!(serde_json::from_str::<OracleAnswer>("null").is_err());
    }

    #[test]
    fn test_structured_serializes_as_stored_form() {
        let json = serde_json::to_value(structured("Yes", Some(0.8))).unwrap();
        assert_eq!(json["answer"], "Yes");
        assert!(json.get("reasoning").is_none());
    }
}
