//! Time related utils.

use chrono::Utc;

/// DateTime is the alias of [`chrono::DateTime<Utc>`].
pub type DateTime = chrono::DateTime<Utc>;

/// Create a new DateTime that points to now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Current unix timestamp in seconds, as carried in `oauth_timestamp`.
pub fn unix_timestamp() -> i64 {
    now().timestamp()
}

/// Format an epoch-milliseconds value as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Sub-second precision is truncated, matching the provider's whole-second
/// reading timestamps.
pub fn format_datetime(epoch_ms: i64) -> String {
    match chrono::DateTime::<Utc>::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Format an epoch-milliseconds value as `YYYY-MM-DD HH:MM:SS.mmm` (UTC).
///
/// Measurement times are delivered with millisecond precision and must not
/// lose it when rendered.
pub fn format_datetime_ms(epoch_ms: i64) -> String {
    match chrono::DateTime::<Utc>::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => String::new(),
    }
}
