//! Domain model for the allergy diary.
//!
//! # Responsibility
//! - Define the persisted shapes owned by diary and profile stores.
//! - Keep validation next to the data it guards.
//!
//! # Invariants
//! - Inapplicable optional fields are absent from JSON, never `null`.
//! - Validation never mutates; normalization happens in explicit helpers.

pub mod profile;
pub mod record;

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Trims and collapses internal whitespace runs to one space.
pub(crate) fn normalize_text(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Like [`normalize_text`], mapping blank input to `None`.
pub(crate) fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| normalize_text(&text))
        .filter(|text| !text.is_empty())
}
