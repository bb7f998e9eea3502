// Form semantics: question discovery, answer-control resolution, filling.
// Everything here works on document snapshots or through `BrowserPage`;
// nothing talks to a browser directly.

pub mod applier;
pub mod extractor;
pub mod field;
pub mod patterns;
pub mod selector;
