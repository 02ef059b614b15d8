//! Time windows and day-boundary arithmetic.
//!
//! This module provides [`TimeWindow`] for expressing range queries against
//! the events API, and helpers for resolving calendar days to UTC instants
//! in a reference timezone.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Resolves midnight of `date` in `tz` to a UTC instant.
///
/// If midnight does not exist in `tz` on that date (DST gap), the earliest
/// valid local time is used; if even that fails the naive midnight is read
/// as UTC so the result is always defined.
pub fn local_midnight_utc(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    tz.from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Returns the calendar day that `instant` falls on in `tz`.
pub fn date_key_in(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a window covering exactly one calendar day in `tz`.
    pub fn for_date(date: NaiveDate, tz: &Tz) -> Self {
        let next = date.succ_opt().expect("date has a successor");
        Self {
            start: local_midnight_utc(date, tz),
            end: local_midnight_utc(next, tz),
        }
    }

    /// Creates the full-sync window around `now`: from the start of the day
    /// `past_days` ago to the end of the day `future_days` ahead, with day
    /// boundaries taken in `tz`.
    pub fn around(now: DateTime<Utc>, past_days: i64, future_days: i64, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let first = today - Duration::days(past_days);
        let last = today + Duration::days(future_days);
        let after_last = last.succ_opt().expect("date has a successor");
        Self {
            start: local_midnight_utc(first, tz),
            end: local_midnight_utc(after_last, tz),
        }
    }

    /// Returns the duration of this window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if an instant falls within this window (`[start, end)`).
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn midnight_resolution_in_offset_zone() {
        // Seoul is UTC+9 year-round.
        let dt = local_midnight_utc(date(2024, 1, 15), &chrono_tz::Asia::Seoul);
        assert_eq!(dt, utc(2024, 1, 14, 15, 0, 0));
    }

    #[test]
    fn midnight_resolution_in_utc() {
        let dt = local_midnight_utc(date(2024, 1, 15), &chrono_tz::UTC);
        assert_eq!(dt, utc(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn date_key_respects_timezone() {
        // 2024-01-14 20:00 UTC is already the 15th in Seoul.
        let instant = utc(2024, 1, 14, 20, 0, 0);
        assert_eq!(date_key_in(instant, &chrono_tz::Asia::Seoul), date(2024, 1, 15));
        assert_eq!(date_key_in(instant, &chrono_tz::UTC), date(2024, 1, 14));
    }

    #[test]
    fn window_for_date() {
        let window = TimeWindow::for_date(date(2024, 3, 15), &chrono_tz::UTC);
        assert_eq!(window.start, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(window.end, utc(2024, 3, 16, 0, 0, 0));
        assert_eq!(window.duration(), Duration::hours(24));
    }

    #[test]
    fn window_around_now() {
        let now = utc(2024, 3, 15, 12, 30, 0);
        let window = TimeWindow::around(now, 30, 30, &chrono_tz::UTC);
        assert_eq!(window.start, utc(2024, 2, 14, 0, 0, 0));
        // End is the boundary after the last included day.
        assert_eq!(window.end, utc(2024, 4, 15, 0, 0, 0));
        assert!(window.contains(now));
    }

    #[test]
    fn window_contains_half_open() {
        let window = TimeWindow::new(utc(2024, 3, 15, 9, 0, 0), utc(2024, 3, 15, 17, 0, 0));
        assert!(window.contains(utc(2024, 3, 15, 9, 0, 0)));
        assert!(window.contains(utc(2024, 3, 15, 16, 59, 59)));
        assert!(!window.contains(utc(2024, 3, 15, 17, 0, 0)));
        assert!(!window.contains(utc(2024, 3, 15, 8, 59, 59)));
    }

    #[test]
    #[should_panic(expected = "start must be <= end")]
    fn invalid_window() {
        TimeWindow::new(utc(2024, 3, 15, 17, 0, 0), utc(2024, 3, 15, 9, 0, 0));
    }
}
