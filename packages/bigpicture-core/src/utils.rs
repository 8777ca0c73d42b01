//! General utilities shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::BLANK;

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Replaces an empty or whitespace-only string with the [`BLANK`] sentinel.
#[must_use]
pub fn or_blank(value: impl Into<String>) -> String {
    let value = value.into();
    if value.trim().is_empty() {
        BLANK.to_string()
    } else {
        value
    }
}

/// Extracts the four-digit year from a `YYYY`, `YYYY-MM` or `YYYY-MM-DD` date.
#[must_use]
pub fn release_year(date: &str) -> Option<&str> {
    let year = date.get(..4)?;
    year.chars().all(|c| c.is_ascii_digit()).then_some(year)
}

/// Returns the id portion of a `vendor:kind:id` URI (the last segment).
#[must_use]
pub fn uri_id(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}
