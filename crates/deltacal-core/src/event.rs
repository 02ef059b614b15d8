//! Calendar event types.
//!
//! This module provides the canonical event representation used by the sync
//! engine and its cache:
//!
//! - [`CalendarEvent`]: a single event keyed by its provider id
//! - [`EventStatus`]: confirmed / tentative / cancelled
//! - [`EventTime`]: either a precise datetime or an all-day date
//!
//! Cancelled events are tombstones: they flow through the delta-sync merge
//! to remove cache entries and are never stored themselves.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::local_midnight_utc;

/// The status of a calendar event as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The event is confirmed.
    #[default]
    Confirmed,
    /// The event is tentatively scheduled.
    Tentative,
    /// The event has been cancelled (deletion tombstone in delta syncs).
    Cancelled,
}

/// The time of a calendar event.
///
/// Calendar events carry either a precise instant or a bare date:
///
/// - **DateTime**: a specific point in time, stored in UTC.
/// - **AllDay**: a date without a time of day. The optional IANA timezone is
///   used only to resolve the date to an instant; when absent, resolution
///   falls back to the caller's reference timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date with an optional source timezone.
    AllDay {
        /// The calendar date of the event.
        date: NaiveDate,
        /// IANA timezone identifier the date belongs to, if known.
        timezone: Option<String>,
    },
}

impl EventTime {
    /// Creates a precise event time from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates an all-day event time without a source timezone.
    pub fn all_day(date: NaiveDate) -> Self {
        Self::AllDay {
            date,
            timezone: None,
        }
    }

    /// Creates an all-day event time with a source timezone.
    pub fn all_day_in(date: NaiveDate, timezone: impl Into<String>) -> Self {
        Self::AllDay {
            date,
            timezone: Some(timezone.into()),
        }
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    /// Resolves this event time to a UTC instant.
    ///
    /// All-day dates resolve to local midnight in their own timezone when it
    /// parses as a valid IANA identifier, otherwise in `reference`.
    pub fn resolve(&self, reference: &Tz) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay { date, timezone } => {
                let tz = timezone
                    .as_deref()
                    .and_then(|name| name.parse::<Tz>().ok())
                    .unwrap_or(*reference);
                local_midnight_utc(*date, &tz)
            }
        }
    }

    /// Returns the calendar day this time falls on, viewed from `reference`.
    pub fn date_key(&self, reference: &Tz) -> NaiveDate {
        self.resolve(reference).with_timezone(reference).date_naive()
    }
}

/// A calendar event keyed by its provider-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Unique identifier for the event.
    pub id: String,
    /// The event title, if any.
    pub summary: Option<String>,
    /// The event description, if any.
    pub description: Option<String>,
    /// The event location, if any.
    pub location: Option<String>,
    /// The provider-reported status.
    pub status: EventStatus,
    /// When the event starts.
    pub start: EventTime,
    /// When the event ends, if known.
    pub end: Option<EventTime>,
    /// When the provider last updated the event.
    pub updated: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// Creates a new event with required fields.
    pub fn new(id: impl Into<String>, status: EventStatus, start: EventTime) -> Self {
        Self {
            id: id.into(),
            summary: None,
            description: None,
            location: None,
            status,
            start,
            end: None,
            updated: None,
        }
    }

    /// Returns `true` if this event is a deletion tombstone.
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Resolves the start to a UTC instant against `reference`.
    pub fn start_instant(&self, reference: &Tz) -> DateTime<Utc> {
        self.start.resolve(reference)
    }

    /// Returns the calendar day this event belongs to in `reference`.
    pub fn date_key(&self, reference: &Tz) -> NaiveDate {
        self.start.date_key(reference)
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the end time.
    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the updated timestamp.
    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = Some(updated);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn datetime_resolution_ignores_reference() {
            let dt = utc(2024, 3, 15, 10, 0, 0);
            let et = EventTime::from_utc(dt);
            assert!(!et.is_all_day());
            assert_eq!(et.resolve(&chrono_tz::Asia::Seoul), dt);
            assert_eq!(et.resolve(&chrono_tz::UTC), dt);
        }

        #[test]
        fn all_day_resolution_uses_own_timezone() {
            let et = EventTime::all_day_in(date(2024, 3, 15), "Asia/Seoul");
            // Midnight in Seoul, even viewed from a UTC reference.
            assert_eq!(et.resolve(&chrono_tz::UTC), utc(2024, 3, 14, 15, 0, 0));
        }

        #[test]
        fn all_day_resolution_falls_back_to_reference() {
            let bare = EventTime::all_day(date(2024, 3, 15));
            assert_eq!(
                bare.resolve(&chrono_tz::Asia::Seoul),
                utc(2024, 3, 14, 15, 0, 0)
            );

            let bogus = EventTime::all_day_in(date(2024, 3, 15), "Not/AZone");
            assert_eq!(
                bogus.resolve(&chrono_tz::Asia::Seoul),
                utc(2024, 3, 14, 15, 0, 0)
            );
        }

        #[test]
        fn date_key_round_trips_for_all_day() {
            let et = EventTime::all_day_in(date(2024, 3, 15), "Asia/Seoul");
            assert_eq!(et.date_key(&chrono_tz::Asia::Seoul), date(2024, 3, 15));
        }

        #[test]
        fn date_key_shifts_for_late_datetimes() {
            // 20:00 UTC is the next day in Seoul.
            let et = EventTime::from_utc(utc(2024, 3, 14, 20, 0, 0));
            assert_eq!(et.date_key(&chrono_tz::Asia::Seoul), date(2024, 3, 15));
            assert_eq!(et.date_key(&chrono_tz::UTC), date(2024, 3, 14));
        }

        #[test]
        fn serde_roundtrip() {
            let et = EventTime::all_day_in(date(2024, 3, 15), "Asia/Seoul");
            let json = serde_json::to_string(&et).unwrap();
            let parsed: EventTime = serde_json::from_str(&json).unwrap();
            assert_eq!(et, parsed);
        }
    }

    mod calendar_event {
        use super::*;

        fn sample() -> CalendarEvent {
            CalendarEvent::new(
                "evt-1",
                EventStatus::Confirmed,
                EventTime::from_utc(utc(2024, 3, 15, 10, 0, 0)),
            )
            .with_summary("Team sync")
            .with_end(EventTime::from_utc(utc(2024, 3, 15, 11, 0, 0)))
        }

        #[test]
        fn builder_and_accessors() {
            let event = sample()
                .with_description("Weekly")
                .with_location("Room 4")
                .with_updated(utc(2024, 3, 14, 9, 0, 0));

            assert_eq!(event.id, "evt-1");
            assert_eq!(event.summary.as_deref(), Some("Team sync"));
            assert_eq!(event.location.as_deref(), Some("Room 4"));
            assert!(!event.is_cancelled());
            assert_eq!(event.date_key(&chrono_tz::UTC), date(2024, 3, 15));
        }

        #[test]
        fn cancelled_detection() {
            let mut event = sample();
            event.status = EventStatus::Cancelled;
            assert!(event.is_cancelled());
        }

        #[test]
        fn status_serde_matches_wire_casing() {
            assert_eq!(
                serde_json::to_string(&EventStatus::Cancelled).unwrap(),
                "\"cancelled\""
            );
            let parsed: EventStatus = serde_json::from_str("\"tentative\"").unwrap();
            assert_eq!(parsed, EventStatus::Tentative);
        }

        #[test]
        fn serde_roundtrip() {
            let event = sample();
            let json = serde_json::to_string(&event).unwrap();
            let parsed: CalendarEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event, parsed);
        }
    }
}
