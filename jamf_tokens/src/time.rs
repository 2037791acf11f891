//! Parsing of the authority's expiry timestamps
//!
//! The server reports absolute expiry instants in a near-ISO 8601 form whose
//! fractional seconds may carry only one or two digits, and which may use `Z`
//! for UTC. Timestamps are normalized to exactly three fractional digits and an
//! explicit offset before parsing.

use chrono::{DateTime, Utc};
use jamf_clock::UnixTime;

const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Rewrites a server timestamp into canonical millisecond form
///
/// * a trailing `Z` becomes `+00:00`
/// * fractional seconds are right-padded with zeros to three digits, or
///   truncated to three digits if longer
/// * a missing fractional part becomes `.000`
///
/// Input that does not look like a timestamp with an offset is returned with
/// only the `Z` rewrite applied.
pub fn fix_fractional_seconds(raw: &str) -> String {
    let raw = raw.trim();
    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(rest) => format!("{}+00:00", rest),
        None => raw.to_owned(),
    };

    let time_start = match normalized.find('T') {
        Some(idx) => idx,
        None => return normalized,
    };

    let offset_start = match normalized[time_start..].rfind(|c: char| c == '+' || c == '-') {
        Some(idx) => time_start + idx,
        None => return normalized,
    };

    let (date_time, offset) = normalized.split_at(offset_start);
    let (whole, fraction) = match date_time.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (date_time, ""),
    };

    let mut millis: String = fraction.chars().take(3).collect();
    while millis.len() < 3 {
        millis.push('0');
    }

    format!("{}.{}{}", whole, millis, offset)
}

/// Parses an absolute expiry timestamp as reported by the server
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let fixed = fix_fractional_seconds(raw);
    let parsed = DateTime::parse_from_str(&fixed, EXPIRY_FORMAT)?;
    Ok(parsed.with_timezone(&Utc))
}

/// Converts an instant to whole-second Unix time, rounding down
#[inline]
pub fn to_unix_time(instant: DateTime<Utc>) -> UnixTime {
    UnixTime::from_timestamp(instant.timestamp())
}
