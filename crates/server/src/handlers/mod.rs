//! API handlers module

pub mod auth;
pub mod documents;
pub mod dossiers;
pub mod folders;
pub mod health;
pub mod notifications;
pub mod reference;
pub mod users;

use acge_common::errors::{AppError, Result};
use serde::{Deserialize, Deserializer};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`)
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim a required text field and check its length in characters
pub(crate) fn required_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(field, format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::validation(
            field,
            format!("{} must be at most {} characters", field, max_len),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank collapses to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
