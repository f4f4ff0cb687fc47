//! Waiting-time arithmetic
//!
//! The SIRI feed sends absolute ISO-8601 instants; the legacy feed sends a
//! pre-computed countdown string. Both end up as whole minutes, with
//! [`UNKNOWN_WAIT`] standing in for "no usable time".

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde_json::Value;

/// Waiting time used when no time could be resolved; sorts last
pub const UNKNOWN_WAIT: u32 = 999;

/// Words the legacy feed uses for a vehicle arriving now
const IMMINENT_WORDS: [&str; 3] = ["proche", "immin.", "imminent"];

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 forms (`Z` or numeric offset, optional fractional
/// seconds). A timestamp without any zone designator is taken as UTC.
/// Returns `None` on anything malformed.
#[must_use]
pub fn parse_iso8601(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parse a timestamp out of a JSON node, `None` for non-strings
#[must_use]
pub fn parse_timestamp(node: Option<&Value>) -> Option<DateTime<FixedOffset>> {
    node.and_then(Value::as_str).and_then(parse_iso8601)
}

/// Convert a countdown string to whole minutes
///
/// `HH:MM:SS` gives `H*60+M`, `MM:SS` gives `M`, a bare integer is taken
/// as-is (negative values clamp to 0) and the "arriving now" words give 0.
/// Seconds are truncated. Anything else is [`UNKNOWN_WAIT`].
#[must_use]
pub fn parse_countdown(raw: &str) -> u32 {
    let text = raw.trim();
    let lowered = text.to_lowercase();
    if IMMINENT_WORDS.contains(&lowered.as_str()) {
        return 0;
    }

    let parts: Vec<&str> = text.split(':').collect();
    let minutes = match parts.as_slice() {
        [hours, minutes, seconds] => parse_unsigned(hours)
            .zip(parse_unsigned(minutes))
            .filter(|_| parse_unsigned(seconds).is_some())
            .and_then(|(h, m)| h.checked_mul(60)?.checked_add(m)),
        [minutes, seconds] => parse_unsigned(minutes).filter(|_| parse_unsigned(seconds).is_some()),
        [single] => single
            .parse::<i64>()
            .ok()
            .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX)),
        _ => None,
    };

    minutes.unwrap_or(UNKNOWN_WAIT)
}

fn parse_unsigned(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Minutes until an arrival, relative to `now`
///
/// The predicted instant wins over the scheduled one. With neither the result
/// is [`UNKNOWN_WAIT`]; otherwise the difference is truncated to whole minutes
/// and never negative.
#[must_use]
pub fn waiting_minutes(
    predicted: Option<DateTime<FixedOffset>>,
    scheduled: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
) -> u32 {
    let Some(arrival) = predicted.or(scheduled) else {
        return UNKNOWN_WAIT;
    };

    let minutes = arrival.with_timezone(&Utc).signed_duration_since(now).num_minutes();
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}
