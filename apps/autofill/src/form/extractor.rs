//! Question Extractor: enumerates question text in a document snapshot and
//! pairs each question with its container and answer control.
//!
//! Records are only kept when they have text and an identifiable container.
//! Records sharing a container are all kept: a follow-up sub-question is a
//! legitimate document shape.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::form::field::{resolve, FieldKind, FieldReference};
use crate::form::patterns::CompiledPatterns;
use crate::form::selector::synthesize_specific;

const DEFAULT_QUESTION_TYPE: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub text: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub question_type: String,
    pub container_id: String,
    pub field_selector: Option<String>,
    pub field_kind: Option<FieldKind>,
}

impl QuestionRecord {
    /// The answer control, if the resolver found one. A selector without a
    /// known kind comes back as `Unresolved`.
    pub fn field(&self) -> Option<FieldReference> {
        self.field_selector.as_ref().map(|selector| FieldReference {
            selector: selector.clone(),
            kind: self.field_kind.unwrap_or(FieldKind::Unresolved),
        })
    }
}

/// Extracts every question in `html`. Sectioned documents are processed one
/// section at a time, in document order; a document with no section markers
/// is treated as a single section.
pub fn extract_document(html: &str, patterns: &CompiledPatterns) -> Vec<QuestionRecord> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let Some(section_pattern) = &patterns.section else {
        return extract(root, patterns);
    };

    let sections: Vec<ElementRef<'_>> = document.select(section_pattern).collect();
    if sections.is_empty() {
        debug!("No form sections found, extracting from the whole document");
        return extract(root, patterns);
    }

    sections
        .into_iter()
        .flat_map(|section| extract(section, patterns))
        .collect()
}

/// Extracts questions found under `scope`, in document order.
pub fn extract(scope: ElementRef<'_>, patterns: &CompiledPatterns) -> Vec<QuestionRecord> {
    scope
        .select(&patterns.question_text)
        .filter_map(|question| build_record(question, patterns))
        .collect()
}

fn build_record(question: ElementRef<'_>, patterns: &CompiledPatterns) -> Option<QuestionRecord> {
    let text = display_text(question);
    if text.is_empty() {
        debug!("Skipping question node with no text");
        return None;
    }

    let Some(container) = find_container(question, &patterns.container_boundaries) else {
        warn!("No container for question \"{}\"", truncate(&text));
        return None;
    };

    let Some(container_id) = container_identity(container) else {
        warn!(
            "Container of question \"{}\" has no usable identity, skipping",
            truncate(&text)
        );
        return None;
    };

    let question_type = patterns
        .container_type_attribute
        .as_deref()
        .and_then(|attr| container.value().attr(attr))
        .map(derive_type)
        .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string());

    let label = patterns
        .field_label
        .as_ref()
        .and_then(|pattern| container.select(pattern).next())
        .map(display_text)
        .filter(|label| !label.is_empty());

    let field = resolve(container);
    if field.is_none() {
        debug!("No answer field for question \"{}\"", truncate(&text));
    }

    Some(QuestionRecord {
        text,
        label,
        question_type,
        container_id,
        field_selector: field.as_ref().map(|f| f.selector.clone()),
        field_kind: field.map(|f| f.kind),
    })
}

/// Walks outward from `question` through each boundary pattern in turn; the
/// parent element is the fallback.
fn find_container<'a>(question: ElementRef<'a>, boundaries: &[Selector]) -> Option<ElementRef<'a>> {
    boundaries
        .iter()
        .find_map(|boundary| closest(question, boundary))
        .or_else(|| question.parent().and_then(ElementRef::wrap))
}

fn closest<'a>(element: ElementRef<'a>, pattern: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| pattern.matches(candidate))
}

fn container_identity(container: ElementRef<'_>) -> Option<String> {
    match container.value().id() {
        Some(id) if !id.is_empty() => Some(id.to_string()),
        _ => synthesize_specific(container),
    }
}

/// `question-multiSelect` → `multiSelect`, `question-yes-no` → `yes-no`.
/// An identifier without a dash is taken as-is; an empty suffix falls back to
/// the default type.
fn derive_type(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return DEFAULT_QUESTION_TYPE.to_string();
    }

    match identifier.split_once('-') {
        Some((_, suffix)) if !suffix.is_empty() => suffix.to_string(),
        Some(_) => DEFAULT_QUESTION_TYPE.to_string(),
        None => identifier.to_string(),
    }
}

/// Rendered text with whitespace runs collapsed, roughly what `innerText` gives.
fn display_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn truncate(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_CHARS).collect::<String>() + "…"
    }
}
