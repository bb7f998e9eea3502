//! Extraction patterns: the vendor conventions a run uses to find questions,
//! their containers, the consent banner and the submit control.
//!
//! Patterns are plain CSS strings so they can travel in run requests;
//! `CompiledPatterns` parses them once before any browser work starts.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid {field} pattern '{pattern}'")]
pub struct PatternError {
    pub field: &'static str,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormProfile {
    #[default]
    Workday,
    Generic,
}

impl std::str::FromStr for FormProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workday" => Ok(FormProfile::Workday),
            "generic" => Ok(FormProfile::Generic),
            other => Err(format!("unknown form profile '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPatterns {
    /// Matches the elements whose text is a question.
    pub question_text: String,
    /// Sub-sections extracted one after another, in document order.
    /// `None` extracts from the whole document.
    #[serde(default)]
    pub section: Option<String>,
    /// Tried in order when walking outward from a question; the nearest
    /// ancestor is the fallback when none match.
    pub container_boundaries: Vec<String>,
    #[serde(default)]
    pub field_label: Option<String>,
    /// Attribute on the container carrying a compound `question-<type>` id.
    #[serde(default)]
    pub container_type_attribute: Option<String>,
    #[serde(default)]
    pub interstitial_accept: Option<String>,
    pub submit: String,
}

const SUBMIT_APPLICATION: &str = r#"[data-qa="submit-application"]"#;

impl ExtractionPatterns {
    pub fn for_profile(profile: FormProfile) -> Self {
        match profile {
            FormProfile::Workday => Self::workday(),
            FormProfile::Generic => Self::generic(),
        }
    }

    pub fn workday() -> Self {
        Self {
            question_text: r#"[data-automation-id="questionText"]"#.to_string(),
            section: Some(r#"[data-automation-id="formSection"]"#.to_string()),
            container_boundaries: vec![
                r#"[data-automation-id^="question-"]"#.to_string(),
                "fieldset".to_string(),
            ],
            field_label: Some(r#"[data-automation-id="fieldLabel"]"#.to_string()),
            container_type_attribute: Some("data-automation-id".to_string()),
            interstitial_accept: Some(
                r#"[data-automation-id="cookieBannerAcceptButton"]"#.to_string(),
            ),
            submit: SUBMIT_APPLICATION.to_string(),
        }
    }

    pub fn generic() -> Self {
        Self {
            question_text: r#"[data-qa="question-text"]"#.to_string(),
            section: None,
            container_boundaries: vec![
                r#"[data-qa="question"]"#.to_string(),
                ".question-container".to_string(),
                "fieldset".to_string(),
            ],
            field_label: None,
            container_type_attribute: None,
            interstitial_accept: None,
            submit: SUBMIT_APPLICATION.to_string(),
        }
    }

    /// Parses every pattern. Browser-side patterns (interstitial, submit)
    /// are only validated here; they travel to the page as strings.
    pub fn compile(&self) -> Result<CompiledPatterns, PatternError> {
        if let Some(accept) = &self.interstitial_accept {
            parse("interstitialAccept", accept)?;
        }
        parse("submit", &self.submit)?;

        Ok(CompiledPatterns {
            question_text: parse("questionText", &self.question_text)?,
            section: self
                .section
                .as_deref()
                .map(|s| parse("section", s))
                .transpose()?,
            container_boundaries: self
                .container_boundaries
                .iter()
                .map(|s| parse("containerBoundaries", s))
                .collect::<Result<_, _>>()?,
            field_label: self
                .field_label
                .as_deref()
                .map(|s| parse("fieldLabel", s))
                .transpose()?,
            container_type_attribute: self.container_type_attribute.clone(),
        })
    }
}

impl Default for ExtractionPatterns {
    fn default() -> Self {
        Self::workday()
    }
}

fn parse(field: &'static str, pattern: &str) -> Result<Selector, PatternError> {
    Selector::parse(pattern).map_err(|_| PatternError {
        field,
        pattern: pattern.to_string(),
    })
}

/// Parsed form of the document-side patterns used by the extractor.
#[derive(Debug)]
pub struct CompiledPatterns {
    pub question_text: Selector,
    pub section: Option<Selector>,
    pub container_boundaries: Vec<Selector>,
    pub field_label: Option<Selector>,
    pub container_type_attribute: Option<String>,
}
