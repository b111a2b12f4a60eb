//! Consumption rates over a window's records.

use crate::models::UsageRecord;
use crate::window::ResolvedWindow;
use chrono::{DateTime, Duration, Utc};

/// Length of the short rate window.
pub const SHORT_RATE_SECS: i64 = 60;

/// Tokens per second. Never negative, zero when there is nothing to count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    pub rate_60s: f64,
    pub rate_session_avg: f64,
}

/// Rates for the records already selected by `window`, measured against `now`.
///
/// The short rate counts records in `[now - 60s, now]`. The session average divides
/// the window's tokens by the closed window's length, or by the time elapsed since the
/// start for open-ended windows, with a one second floor.
pub fn compute_rates(records: &[&UsageRecord], window: &ResolvedWindow, now: DateTime<Utc>) -> Rates {
    let short_start = now - Duration::seconds(SHORT_RATE_SECS);
    let recent: u64 = records
        .iter()
        .filter(|r| short_start <= r.timestamp && r.timestamp <= now)
        .fold(0u64, |acc, r| acc.saturating_add(r.total_tokens()));

    let total: u64 = records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.total_tokens()));

    let span_end = if window.open_ended { now } else { window.end };
    let elapsed = (span_end - window.start).num_seconds().max(1);

    Rates {
        rate_60s: per_second(recent, SHORT_RATE_SECS),
        rate_session_avg: per_second(total, elapsed),
    }
}

fn per_second(tokens: u64, seconds: i64) -> f64 {
    if tokens == 0 {
        return 0.0;
    }
    tokens as f64 / seconds as f64
}
