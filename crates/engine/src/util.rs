//! Internal helpers for input validation.
//!
//! These utilities are **not** part of the public API.

use crate::{EngineError, ResultEngine};

/// Trim a required identifier, rejecting blanks.
pub(crate) fn require_text<'a>(value: &'a str, label: &str) -> ResultEngine<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidPayload(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed)
}

/// Trim optional free text, mapping blanks to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
