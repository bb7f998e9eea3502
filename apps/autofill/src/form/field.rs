//! Field Resolver: finds the answer control that belongs to a question.
//!
//! Matchers run in priority order within the container and the first hit
//! wins. Multiline controls come first so an incidental single-line control in
//! the same container (a search box, say) never steals an open-ended answer.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::form::selector::synthesize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    TextInput,
    Textarea,
    Choice,
    Unresolved,
}

impl FieldKind {
    pub fn is_text(self) -> bool {
        matches!(self, FieldKind::TextInput | FieldKind::Textarea)
    }
}

/// A re-locatable pointer to an answer control.
///
/// A tag-only `selector` is ambiguous; interactions act on its first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    pub selector: String,
    pub kind: FieldKind,
}

struct Matcher {
    css: &'static str,
    kind: FieldKind,
}

const MATCHERS: [Matcher; 4] = [
    Matcher {
        css: "textarea",
        kind: FieldKind::Textarea,
    },
    Matcher {
        css: r#"input[type="text"]"#,
        kind: FieldKind::TextInput,
    },
    Matcher {
        css: "input:not([type])",
        kind: FieldKind::TextInput,
    },
    Matcher {
        css: "select",
        kind: FieldKind::Choice,
    },
];

static COMPILED: LazyLock<Vec<(Selector, FieldKind)>> = LazyLock::new(|| {
    MATCHERS
        .iter()
        .filter_map(|m| Selector::parse(m.css).ok().map(|css| (css, m.kind)))
        .collect()
});

/// Returns the most plausible answer control inside `container`, or `None`
/// when the container holds nothing answerable.
pub fn resolve(container: ElementRef<'_>) -> Option<FieldReference> {
    COMPILED.iter().find_map(|(css, kind)| {
        container.select(css).next().map(|element| FieldReference {
            selector: synthesize(element),
            kind: *kind,
        })
    })
}
