//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application,
//! most importantly the [`ReportingClock`] that defines the authoritative
//! day boundary for rotation eligibility.

pub mod retry;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::{Error, Result};

/// Authoritative clock for day-boundary decisions.
///
/// Timestamps are stored in UTC; "today" is defined by a fixed UTC offset
/// configured once at startup, so eligibility checks behave the same no
/// matter which host or database computes them.
#[derive(Debug, Clone, Copy)]
pub struct ReportingClock {
    offset: FixedOffset,
}

impl ReportingClock {
    /// Create a clock with the given offset from UTC, in minutes east
    /// (e.g. 180 for UTC+03:00).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| Error::config(format!("invalid UTC offset: {minutes} minutes")))?;
        Ok(Self { offset })
    }

    /// UTC clock (offset 0)
    pub fn utc() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).expect("zero offset is always valid"),
        }
    }

    /// Current instant in UTC
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Current instant shifted into the reporting zone (for display)
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.offset)
    }

    /// Calendar day an instant falls on, in the reporting zone
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Current calendar day in the reporting zone
    pub fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }

    /// Start of the current reporting-zone day, as a UTC instant.
    ///
    /// An item with `last_used_at` strictly before this instant was used on
    /// an earlier calendar day and is therefore eligible again.
    pub fn day_start_utc(&self) -> DateTime<Utc> {
        self.day_start_utc_of(self.now())
    }

    /// Start of the reporting-zone day containing `ts`, as a UTC instant
    pub fn day_start_utc_of(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let local_day = self.day_of(ts);
        let local_midnight = local_day
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_local_timezone(self.offset)
            .single()
            .expect("fixed offsets have no DST gaps");
        local_midnight.with_timezone(&Utc)
    }

    /// Offset in minutes east of UTC
    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }
}

/// Canonical timestamp format for SQLite storage.
///
/// Always renders with a `+00:00` suffix so stored strings compare
/// lexicographically in chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp previously written by [`format_ts`]
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Truncate text to a maximum length, appending an ellipsis
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_boundary_with_offset() {
        // UTC+03:00: 22:30 UTC on June 14 is already June 15 locally
        let clock = ReportingClock::from_offset_minutes(180).unwrap();
        let late_utc = Utc.with_ymd_and_hms(2025, 6, 14, 22, 30, 0).unwrap();

        assert_eq!(
            clock.day_of(late_utc),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        );
        assert_eq!(
            clock.day_start_utc_of(late_utc),
            Utc.with_ymd_and_hms(2025, 6, 14, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_utc_clock_day_start() {
        let clock = ReportingClock::utc();
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 13, 45, 12).unwrap();
        assert_eq!(
            clock.day_start_utc_of(ts),
            Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(ReportingClock::from_offset_minutes(24 * 60).is_err());
    }

    #[test]
    fn test_ts_roundtrip_and_ordering() {
        let earlier = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();

        assert_eq!(parse_ts(&format_ts(earlier)), Some(earlier));
        assert!(format_ts(earlier) < format_ts(later));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }
}
