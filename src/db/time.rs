//! Timestamp and identifier generation for stored records.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a timestamp as RFC 3339 with fixed microsecond precision.
///
/// The fixed width keeps lexical order equal to chronological order, which the
/// `created_at` indexes rely on.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A timestamp strictly later than `previous`, normally the current time.
pub fn next_timestamp(previous: &str) -> String {
    let now = Utc::now();
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) => {
            let floor = prev.with_timezone(&Utc) + Duration::microseconds(1);
            format_timestamp(now.max(floor))
        }
        Err(_) => format_timestamp(now),
    }
}

/// Generate an opportunity identifier: epoch milliseconds followed by random hex.
pub fn generate_opportunity_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", Utc::now().timestamp_millis(), &random[..12])
}
