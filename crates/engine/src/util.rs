//! Internal helpers for input normalization and ownership checks.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation logic so every operation enforces the same rules.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim a required name, rejecting blank input with the error built by `err`.
pub(crate) fn normalize_required_name(
    value: &str,
    label: &str,
    err: fn(String) -> EngineError,
) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Case and accent insensitive key used for category uniqueness.
///
/// `"Food & Dining"` and `"food  &dining"` map to the same key.
pub(crate) fn normalize_name_key(input: &str) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if ch == '&' {
            // keeps "A & B" distinct from "A B"
            if !out.is_empty() && !prev_space {
                out.push(' ');
            }
            out.push_str("& ");
            prev_space = true;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim().to_string()
}

/// Fail with `Unauthorized` when `owner` is not `user_id`.
pub(crate) fn ensure_owner(owner: Uuid, user_id: Uuid, label: &str) -> ResultEngine<()> {
    if owner != user_id {
        return Err(EngineError::Unauthorized(format!(
            "{label} belongs to another user"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_folds_case_accents_and_spacing() {
        assert_eq!(normalize_name_key("  Café   Bar "), "cafe bar");
        assert_eq!(normalize_name_key("Food & Dining"), "food & dining");
        assert_eq!(normalize_name_key("food  &dining"), "food & dining");
        assert_ne!(normalize_name_key("Food Dining"), normalize_name_key("Food & Dining"));
    }

    #[test]
    fn required_name_rejects_blank() {
        let err = normalize_required_name("   ", "category name", EngineError::InvalidCategory)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidCategory("category name must not be empty".to_string())
        );
    }
}
