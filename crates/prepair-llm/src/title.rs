//! Title post-processing: strip label prefixes the model sometimes adds,
//! then normalise punctuation and whitespace.

use lazy_static::lazy_static;
use regex::Regex;

use crate::prompts::TITLE_SENTINEL;

lazy_static! {
    /// Leading label phrases occasionally prepended despite the contract.
    static ref LABEL_PREFIX: Regex = Regex::new(
        r"(?ix)^\s*(?:
            title\s*:                                 |
            the\s+title\s+is\s*:                      |
            exact\s+title\s+of\s+the\s+paper\s+is\s*: |
            here\s+is\s+the\s+title\s*:
        )\s*"
    )
    .unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Remove all newline characters so the first chunk reads as one line.
pub fn strip_newlines(text: &str) -> String {
    text.replace(['\n', '\r'], "")
}

/// Strip leading label phrases and stray `:`/`;`, collapse whitespace runs.
/// Returns `None` when nothing but labels/punctuation was present.
pub fn clean_title(raw: &str) -> Option<String> {
    let text = LABEL_PREFIX.replace(raw, "");
    let text = text.trim_matches(|c: char| c == ':' || c == ';' || c.is_whitespace());
    let text = WHITESPACE_RUN.replace_all(text, " ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Whether a cleaned title terminates the document's pipeline.
pub fn is_unresolved(cleaned: Option<&str>) -> bool {
    match cleaned {
        None => true,
        Some(t) => t == TITLE_SENTINEL,
    }
}
