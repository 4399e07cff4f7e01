//! Time-related utilities.

use chrono::{DateTime, Utc};

/// Get the current Unix timestamp in milliseconds (UTC).
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a Unix timestamp (milliseconds) to an RFC 3339 string (UTC).
///
/// Timestamps outside the representable range render as "invalid".
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.to_rfc3339(),
        None => "invalid".to_string(),
    }
}
