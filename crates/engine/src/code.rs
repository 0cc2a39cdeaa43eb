//! The module contains the outline code parser.
//!
//! An outline code is a dot-delimited string (`"A"`, `"A.1"`, `"A.1.2"`) used
//! both as the line-item label and as the sole carrier of hierarchy: the
//! parent of `"A.1.2"` is whatever row carries `"A.1"`. Codes are opaque
//! strings compared by prefix; no character set is enforced.

use crate::EngineError;

/// A normalized outline code with its derived position in the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCode {
    /// The code with **all** whitespace removed, not just leading/trailing.
    pub normalized: String,
    /// The text before the last `.`, or `None` for a top-level code.
    pub parent: Option<String>,
    /// Number of dot-separated segments (`"A.1.2"` has depth 3).
    pub depth: usize,
}

/// Parses and normalizes an outline code.
///
/// Fails with [`EngineError::InvalidCode`] when the code is empty after
/// normalization.
pub fn parse(raw: &str) -> Result<ParsedCode, EngineError> {
    let normalized: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if normalized.is_empty() {
        return Err(EngineError::InvalidCode(
            "code must not be empty".to_string(),
        ));
    }

    let parent = normalized
        .rfind('.')
        .map(|pos| normalized[..pos].to_string());
    let depth = normalized.split('.').count();

    Ok(ParsedCode {
        normalized,
        parent,
        depth,
    })
}

/// Returns `true` when the raw code is empty or whitespace only.
///
/// Blank-code rows are dropped from set processing before the hierarchy is
/// built; they are not an error.
#[must_use]
pub fn is_blank(raw: &str) -> bool {
    raw.chars().all(char::is_whitespace)
}
