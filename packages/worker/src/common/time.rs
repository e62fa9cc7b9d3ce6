//! Timestamp helpers shared by the stores and the scheduler.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

/// Drop seconds and sub-seconds. Materialized jobs are keyed on this value.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Drop sub-microsecond precision, matching what the stores persist.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000).unwrap_or(ts)
}

/// Current time at storage precision.
pub fn utc_now() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}

/// Fixed-width RFC 3339 (microseconds, `Z` suffix).
///
/// Every stored timestamp uses this form so that text comparison in SQL
/// matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}
