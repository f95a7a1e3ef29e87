//! ISO week stamps for snapshot naming and retention.
//!
//! A snapshot database is named `{base}-week-{week}-{year}` where week and
//! year are the ISO 8601 week and week-based year of the run. Retention
//! compares stamps as `(year, week)` pairs, not by elapsed days, so around a
//! year boundary a snapshot can be kept or dropped a few days early or late.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Infix between the base database name and the week/year suffix.
pub const SNAPSHOT_INFIX: &str = "-week-";

/// ISO week-year and week number. Field order gives the lexicographic
/// `(year, week)` ordering used by retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekStamp {
    pub year: i32,
    pub week: u32,
}

impl WeekStamp {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// ISO week of the given instant (UTC calendar).
    pub fn of(instant: DateTime<Utc>) -> Self {
        let iso = instant.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Week stamp of `now - keep_weeks` weeks. Snapshots strictly older than
    /// this stamp are expired.
    ///
    /// A window reaching past the earliest representable date saturates to a
    /// stamp below every real week, so nothing expires.
    pub fn retention_cutoff(now: DateTime<Utc>, keep_weeks: u32) -> Self {
        Duration::try_weeks(i64::from(keep_weeks))
            .and_then(|window| now.checked_sub_signed(window))
            .map(Self::of)
            .unwrap_or(Self { year: i32::MIN, week: 1 })
    }

    /// Database name of the snapshot of `base` taken in this week.
    pub fn snapshot_name(&self, base: &str) -> String {
        format!("{}{}{}-{}", base, SNAPSHOT_INFIX, self.week, self.year)
    }

    /// Prefix shared by every snapshot database of `base`.
    pub fn snapshot_prefix(base: &str) -> String {
        format!("{}{}", base, SNAPSHOT_INFIX)
    }

    /// Parse the stamp out of a snapshot database name of `base`.
    ///
    /// Returns `None` when the name is not under the base's prefix or the
    /// suffix is not exactly `{week}-{year}` in plain digits with a week in
    /// `1..=53`.
    pub fn parse_snapshot_name(base: &str, name: &str) -> Option<Self> {
        let suffix = name.strip_prefix(&Self::snapshot_prefix(base))?;
        let (week, year) = suffix.split_once('-')?;
        let week: u32 = parse_digits(week)?;
        let year: i32 = parse_digits(year)?;
        if !(1..=53).contains(&week) {
            return None;
        }
        Some(Self { year, week })
    }
}

impl fmt::Display for WeekStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

// `str::parse` accepts a leading `+`, which never appears in names we generate.
fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
