//! Datetime handling for the wire and storage formats
//!
//! Datetime attribute values travel as ISO-8601 strings with millisecond
//! precision and an explicit UTC offset: `YYYY-MM-DDTHH:mm:ss.sss+HH:MM`.
//! The storage form is the same shape normalized to UTC (`+00:00`), which
//! keeps adapter-side ordering lexicographic.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// Current UTC time, truncated to millisecond precision
///
/// Truncation keeps `$createdAt`/`$updatedAt` round-trippable through the
/// wire format without losing equality.
pub fn now() -> DateTime<Utc> {
    let ms = Utc::now().timestamp_millis();
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Format a datetime in the wire format, preserving its offset
pub fn format(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Format a UTC datetime in the storage form (`+00:00` offset)
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Parse a wire-format datetime string
///
/// Accepts any RFC 3339 offset spelling, including `Z`.
pub fn parse(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| DatabaseError::Structure(format!("Invalid datetime value \"{value}\": {e}")))
}

/// Normalize a wire-format datetime to the UTC storage form
pub fn to_storage(value: &str) -> Result<String> {
    let parsed = parse(value)?;
    Ok(format_utc(&parsed.with_timezone(&Utc)))
}

/// Restore a storage-form datetime to the wire format
///
/// Storage strings are already RFC 3339; this re-emits them with the
/// canonical millisecond precision so decode output is stable regardless of
/// what the adapter stored.
pub fn from_storage(value: &str) -> Result<String> {
    let parsed = parse(value)?;
    Ok(format(&parsed))
}
