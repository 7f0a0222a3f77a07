pub mod attendance;
pub mod employee;
pub mod root;

use crate::error::{BLANK, FieldErrors, REQUIRED};

/// PUT and POST need every field, PATCH takes any subset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

pub(crate) fn check_required<T>(
    errors: &mut FieldErrors,
    mode: WriteMode,
    field: &str,
    value: &Option<T>,
) {
    if value.is_none() && mode == WriteMode::Full {
        errors.add(field, REQUIRED);
    }
}

/// Trims surrounding whitespace in place, then rejects what is left if empty.
pub(crate) fn check_text(
    errors: &mut FieldErrors,
    mode: WriteMode,
    field: &str,
    value: &mut Option<String>,
) {
    if let Some(text) = value.as_mut() {
        let trimmed = text.trim();
        if trimmed.len() != text.len() {
            *text = trimmed.to_string();
        }
        if text.is_empty() {
            errors.add(field, BLANK);
        }
    }
    check_required(errors, mode, field, value);
}
