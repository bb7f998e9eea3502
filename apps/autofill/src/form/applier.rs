//! Autofill Applier: writes one answer into one resolved control.

use std::time::Duration;

use thiserror::Error;

use crate::browser::{BrowserError, BrowserPage, ChoiceOption};
use crate::form::field::{FieldKind, FieldReference};

#[derive(Debug, Error)]
pub enum FillError {
    #[error("no matching option for \"{answer}\" in {selector}")]
    NoMatchingOption { selector: String, answer: String },

    #[error("control kind of {0} is unresolved")]
    Unresolved(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Typed,
    Selected,
    /// Blank answer: the control was not touched.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FillOptions {
    pub visibility_timeout: Duration,
    pub typing_delay: Duration,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(5),
            typing_delay: Duration::from_millis(20),
        }
    }
}

pub async fn apply(
    page: &dyn BrowserPage,
    field: &FieldReference,
    answer: &str,
    options: &FillOptions,
) -> Result<FillOutcome, FillError> {
    if field.kind == FieldKind::Unresolved {
        return Err(FillError::Unresolved(field.selector.clone()));
    }
    if answer.trim().is_empty() {
        return Ok(FillOutcome::Skipped);
    }

    if field.kind.is_text() {
        fill_text(page, field, answer, options).await
    } else {
        fill_choice(page, field, answer, options).await
    }
}

async fn fill_text(
    page: &dyn BrowserPage,
    field: &FieldReference,
    answer: &str,
    options: &FillOptions,
) -> Result<FillOutcome, FillError> {
    let selector = field.selector.as_str();
    page.wait_visible(selector, options.visibility_timeout).await?;
    page.scroll_into_view(selector).await?;
    page.clear(selector).await?;
    // Per-key typing so validators listening for discrete input events fire.
    page.type_text(selector, answer, options.typing_delay).await?;

    Ok(FillOutcome::Typed)
}

async fn fill_choice(
    page: &dyn BrowserPage,
    field: &FieldReference,
    answer: &str,
    options: &FillOptions,
) -> Result<FillOutcome, FillError> {
    let selector = field.selector.as_str();
    page.wait_visible(selector, options.visibility_timeout).await?;
    page.scroll_into_view(selector).await?;

    let choices = page.choice_options(selector).await?;
    let option = match_option(&choices, answer).ok_or_else(|| FillError::NoMatchingOption {
        selector: selector.to_string(),
        answer: answer.to_string(),
    })?;

    page.select_choice(selector, &option.value).await?;
    Ok(FillOutcome::Selected)
}

/// Exact value match first, then case-insensitive trimmed label match.
pub fn match_option<'a>(options: &'a [ChoiceOption], answer: &str) -> Option<&'a ChoiceOption> {
    options.iter().find(|o| o.value == answer).or_else(|| {
        let wanted = answer.trim().to_lowercase();
        options
            .iter()
            .find(|o| o.label.trim().to_lowercase() == wanted)
    })
}
