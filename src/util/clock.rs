//! Wall-clock helpers and the persisted timestamp format.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::{QueueError, QueueResult};

/// Current UTC time truncated to microseconds, the precision that is persisted.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Fixed-width RFC 3339 form (`2024-01-01T00:00:00.000000Z`); lexical order equals time order.
#[must_use]
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_ts`] (or any RFC 3339 string).
///
/// # Errors
///
/// Returns [`QueueError::Corrupt`] when the text is not RFC 3339.
pub fn parse_ts(raw: &str) -> QueueResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| QueueError::Corrupt(format!("bad timestamp `{raw}`: {e}")))
}
