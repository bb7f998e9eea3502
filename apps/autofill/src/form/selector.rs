//! Selector Synthesizer: turns an element in a document snapshot into a
//! reference string that re-locates the same element on the live page.
//!
//! Strategies are tried in order and the first one that produces a reference
//! wins:
//! 1. `#id` when the element carries an id.
//! 2. `tag[attr="value"]` for the first present attribute out of `name`,
//!    `aria-label`, `data-qa`, `data-automation-id`.
//! 3. The bare tag name. This one is ambiguous: callers act on the first
//!    match only.

use scraper::ElementRef;

/// Attributes that usually identify a control, in preference order.
const NAMED_ATTRIBUTES: [&str; 4] = ["name", "aria-label", "data-qa", "data-automation-id"];

type Strategy = fn(ElementRef<'_>) -> Option<String>;

/// The strategies that yield a specific reference. The tag-only fallback is
/// kept out of this list because it never fails.
const SPECIFIC_STRATEGIES: [Strategy; 2] = [by_id, by_named_attribute];

pub fn synthesize(element: ElementRef<'_>) -> String {
    synthesize_specific(element).unwrap_or_else(|| by_tag(element))
}

/// Like `synthesize` but without the ambiguous tag-only fallback.
pub fn synthesize_specific(element: ElementRef<'_>) -> Option<String> {
    first_match(&SPECIFIC_STRATEGIES, element)
}

fn first_match(strategies: &[Strategy], element: ElementRef<'_>) -> Option<String> {
    strategies.iter().find_map(|strategy| strategy(element))
}

fn by_id(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .id()
        .filter(|id| !id.is_empty())
        .map(|id| format!("#{}", css_escape(id)))
}

fn by_named_attribute(element: ElementRef<'_>) -> Option<String> {
    let tag = element.value().name();
    NAMED_ATTRIBUTES.iter().find_map(|attr| {
        element
            .value()
            .attr(attr)
            .filter(|value| !value.is_empty())
            .map(|value| format!("{tag}[{attr}=\"{}\"]", css_escape(value)))
    })
}

fn by_tag(element: ElementRef<'_>) -> String {
    element.value().name().to_string()
}

/// Serializes `value` as a CSS identifier, following the CSSOM `CSS.escape`
/// algorithm. The output is also safe inside a double-quoted attribute value.
pub fn css_escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());

    for (index, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        match ch {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{code:x} ")),
            '0'..='9' if index == 0 => out.push_str(&format!("\\{code:x} ")),
            '0'..='9' if index == 1 && chars[0] == '-' => out.push_str(&format!("\\{code:x} ")),
            '-' if index == 0 && chars.len() == 1 => out.push_str("\\-"),
            _ if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() => {
                out.push(ch)
            }
            _ => {
                out.push('\\');
                out.push(ch);
            }
        }
    }

    out
}
