//! Shared utility functions used across the services.

use crate::error::ApiError;

/// Current UTC time as an RFC 3339 string, the format every table stores.
///
/// Fixed microsecond precision keeps the strings lexicographically ordered.
pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Compare two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Take a required text field, trimmed. Missing or blank fields are validation errors.
pub fn required_trimmed(value: Option<String>, field: &str) -> Result<String, ApiError> {
    let value = value.unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("Field \"{}\" is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Take a required field verbatim (secrets are not trimmed). Only emptiness is rejected.
pub fn required_raw(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("Field \"{}\" is required", field))),
    }
}
