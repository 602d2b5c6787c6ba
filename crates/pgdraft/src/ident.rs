//! Identifier checks for names that arrive from outside the code.
//!
//! Builder identifiers are trusted and written verbatim. Column names carried by
//! a browser request (the tabular filter map) are not, and must pass
//! [`validate_identifier`] before they reach SQL text.
//!
//! Accepted: `name`, `table.name`, `schema.table.name`, where every part matches
//! `[A-Za-z_][A-Za-z0-9_$]*`.

use crate::error::{DraftError, DraftResult};

const MAX_PARTS: usize = 3;

fn is_plain_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Check that `s` is a plain, optionally dotted, SQL identifier.
pub fn validate_identifier(s: &str) -> DraftResult<()> {
    if s.is_empty() {
        return Err(DraftError::validation("Identifier cannot be empty"));
    }
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() > MAX_PARTS {
        return Err(DraftError::validation(format!(
            "Identifier has too many parts (max {MAX_PARTS}): {s}"
        )));
    }
    if let Some(bad) = parts.iter().find(|p| !is_plain_part(p)) {
        return Err(DraftError::validation(format!(
            "Invalid identifier part '{bad}' in '{s}'"
        )));
    }
    Ok(())
}

pub fn is_identifier(s: &str) -> bool {
    validate_identifier(s).is_ok()
}
