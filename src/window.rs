//! Window specifications and their resolution against the wall clock
//!
//! Presets are resolved when a query runs, never when they are selected, so a
//! `trailing-24h` window slides forward on every refresh. Resolution produces a
//! half-open `[start, end)` interval: a record stamped exactly at `end` belongs to
//! the next window, not this one.
//!
//! ## Week boundary
//!
//! "Start of week" is the most recent local Monday at the configured hour that is not
//! in the future. Evaluated on a Sunday it is the Monday six days earlier; evaluated on
//! a Monday before that hour it is the previous Monday. Local times that fall in a DST
//! gap move forward to the next valid hour; ambiguous ones take the earlier instant.

use crate::error::{EngineError, Result};
use crate::models::UsageRecord;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_WEEK_START_HOUR: u32 = 9;

/// A named preset or an explicit `[start, end)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WindowSpec {
    WeekStart,
    Today,
    Trailing24h,
    Trailing7d,
    Trailing30d,
    AllTime,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A window pinned to concrete instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// True for presets whose end is "now"; false for explicit ranges.
    pub open_ended: bool,
}

#[derive(Debug, Error)]
#[error("unknown window preset '{0}' (expected one of: week, today, 24h, 7d, 30d, all)")]
pub struct UnknownPreset(pub String);

impl WindowSpec {
    pub const PRESETS: [WindowSpec; 6] = [
        WindowSpec::WeekStart,
        WindowSpec::Today,
        WindowSpec::Trailing24h,
        WindowSpec::Trailing7d,
        WindowSpec::Trailing30d,
        WindowSpec::AllTime,
    ];

    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let spec = WindowSpec::Custom { start, end };
        spec.validate()?;
        Ok(spec)
    }

    /// Rejects explicit ranges that end before they start. An empty range is valid.
    pub fn validate(&self) -> Result<()> {
        match *self {
            WindowSpec::Custom { start, end } if start > end => {
                Err(EngineError::InvalidWindow { start, end })
            }
            _ => Ok(()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            WindowSpec::WeekStart => "This week".to_string(),
            WindowSpec::Today => "Today".to_string(),
            WindowSpec::Trailing24h => "Last 24h".to_string(),
            WindowSpec::Trailing7d => "Last 7 days".to_string(),
            WindowSpec::Trailing30d => "Last 30 days".to_string(),
            WindowSpec::AllTime => "All time".to_string(),
            WindowSpec::Custom { start, end } => format!(
                "{} → {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            ),
        }
    }

    /// Resolve in the local time zone.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        week_start_hour: u32,
        earliest_record: Option<DateTime<Utc>>,
    ) -> Result<ResolvedWindow> {
        self.resolve_in(&Local, now, week_start_hour, earliest_record)
    }

    /// Resolve against `now` in time zone `tz`.
    ///
    /// `AllTime` starts at the earliest known record (or `now` when there is none) so
    /// its session average is taken over the span that actually has data.
    pub fn resolve_in<Tz: TimeZone>(
        &self,
        tz: &Tz,
        now: DateTime<Utc>,
        week_start_hour: u32,
        earliest_record: Option<DateTime<Utc>>,
    ) -> Result<ResolvedWindow> {
        self.validate()?;

        let open = |start: DateTime<Utc>| ResolvedWindow {
            start,
            end: now,
            open_ended: true,
        };

        let resolved = match *self {
            WindowSpec::WeekStart => open(week_start(tz, now, week_start_hour)),
            WindowSpec::Today => {
                let today = now.with_timezone(tz).date_naive();
                open(local_instant(tz, today, 0))
            }
            WindowSpec::Trailing24h => open(now - Duration::hours(24)),
            WindowSpec::Trailing7d => open(now - Duration::days(7)),
            WindowSpec::Trailing30d => open(now - Duration::days(30)),
            WindowSpec::AllTime => open(earliest_record.map_or(now, |ts| ts.min(now))),
            WindowSpec::Custom { start, end } => ResolvedWindow {
                start,
                end,
                open_ended: false,
            },
        };

        Ok(resolved)
    }
}

impl ResolvedWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    /// Records whose timestamp falls in `[start, end)`.
    pub fn select<'a, I>(&self, records: I) -> Vec<&'a UsageRecord>
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        records
            .into_iter()
            .filter(|record| self.contains(record.timestamp))
            .collect()
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for WindowSpec {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "week-start" | "this-week" => Ok(WindowSpec::WeekStart),
            "today" => Ok(WindowSpec::Today),
            "24h" | "day" => Ok(WindowSpec::Trailing24h),
            "7d" => Ok(WindowSpec::Trailing7d),
            "30d" => Ok(WindowSpec::Trailing30d),
            "all" | "all-time" => Ok(WindowSpec::AllTime),
            _ => Err(UnknownPreset(s.to_string())),
        }
    }
}

fn week_start<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

    let candidate = local_instant(tz, monday, hour);
    if candidate <= now {
        candidate
    } else {
        local_instant(tz, monday - Duration::days(7), hour)
    }
}

/// `date` at `hour:00` local time, as a UTC instant.
fn local_instant<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> DateTime<Utc> {
    for h in hour.min(23)..24 {
        let Some(naive) = date.and_hms_opt(h, 0, 0) else {
            continue;
        };
        if let Some(local) = tz.from_local_datetime(&naive).earliest() {
            return local.with_timezone(&Utc);
        }
    }
    date.and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_default()
        .and_utc()
}
