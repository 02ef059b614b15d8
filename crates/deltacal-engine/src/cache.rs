//! In-memory event cache.
//!
//! Holds the synced events keyed by id. Full syncs replace the whole cache,
//! delta syncs merge upserts and tombstones into it, and single-day fetches
//! upsert without removing anything. Cancelled events never live here; they
//! only ever remove entries.

use std::collections::HashMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use deltacal_core::CalendarEvent;
use tracing::debug;

use crate::api::SyncItem;

/// The merged event state, keyed by event id.
#[derive(Debug, Default)]
pub struct EventCache {
    by_id: HashMap<String, CalendarEvent>,
}

impl EventCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached events.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if the cache holds no events.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Looks up an event by id.
    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.by_id.get(id)
    }

    /// Replaces the entire cache contents (full sync).
    ///
    /// Cancelled events in the input are dropped rather than stored.
    pub fn replace_all(&mut self, events: impl IntoIterator<Item = CalendarEvent>) {
        self.by_id.clear();
        for event in events {
            if !event.is_cancelled() {
                self.by_id.insert(event.id.clone(), event);
            }
        }
        debug!(events = self.by_id.len(), "cache replaced");
    }

    /// Merges a delta batch: upserts live events, removes tombstoned ids.
    ///
    /// Returns `(upserted, removed)` counts.
    pub fn apply(&mut self, items: impl IntoIterator<Item = SyncItem>) -> (usize, usize) {
        let mut upserted = 0;
        let mut removed = 0;
        for item in items {
            match item {
                SyncItem::Event(event) if !event.is_cancelled() => {
                    self.by_id.insert(event.id.clone(), event);
                    upserted += 1;
                }
                SyncItem::Event(event) => {
                    if self.by_id.remove(&event.id).is_some() {
                        removed += 1;
                    }
                }
                SyncItem::Tombstone(id) => {
                    if self.by_id.remove(&id).is_some() {
                        removed += 1;
                    }
                }
            }
        }
        debug!(upserted, removed, total = self.by_id.len(), "cache merged");
        (upserted, removed)
    }

    /// Upserts live events without removing anything (single-day fetch).
    ///
    /// Cancelled events are dropped.
    pub fn upsert_all(&mut self, events: impl IntoIterator<Item = CalendarEvent>) {
        for event in events {
            if !event.is_cancelled() {
                self.by_id.insert(event.id.clone(), event);
            }
        }
    }

    /// Drops every cached event.
    pub fn clear(&mut self) {
        self.by_id.clear();
    }

    /// All events ordered by resolved start, ties broken by id.
    pub fn events_sorted(&self, reference: &Tz) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self.by_id.values().cloned().collect();
        events.sort_by(|a, b| {
            a.start_instant(reference)
                .cmp(&b.start_instant(reference))
                .then_with(|| a.id.cmp(&b.id))
        });
        events
    }

    /// The events falling on `date` (viewed in `reference`), in start order.
    pub fn events_for_date(&self, date: NaiveDate, reference: &Tz) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self
            .by_id
            .values()
            .filter(|e| e.date_key(reference) == date)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.start_instant(reference)
                .cmp(&b.start_instant(reference))
                .then_with(|| a.id.cmp(&b.id))
        });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use deltacal_core::{EventStatus, EventTime};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent::new(id, EventStatus::Confirmed, EventTime::from_utc(start))
    }

    fn cancelled(id: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent::new(id, EventStatus::Cancelled, EventTime::from_utc(start))
    }

    #[test]
    fn replace_all_drops_cancelled_events() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            event("a", utc(2024, 3, 15, 10, 0)),
            cancelled("b", utc(2024, 3, 15, 11, 0)),
        ]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn apply_upserts_and_removes() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            event("a", utc(2024, 3, 15, 10, 0)),
            event("b", utc(2024, 3, 15, 11, 0)),
        ]);

        let updated = event("a", utc(2024, 3, 15, 9, 0)).with_summary("moved");
        let (upserted, removed) = cache.apply(vec![
            SyncItem::Event(updated),
            SyncItem::Tombstone("b".to_string()),
            SyncItem::Event(event("c", utc(2024, 3, 16, 10, 0))),
            // Tombstone for an id we never had: a no-op.
            SyncItem::Tombstone("ghost".to_string()),
        ]);

        assert_eq!((upserted, removed), (2, 1));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().summary.as_deref(), Some("moved"));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn cancelled_event_in_apply_removes_the_entry() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![event("a", utc(2024, 3, 15, 10, 0))]);

        cache.apply(vec![SyncItem::Event(cancelled("a", utc(2024, 3, 15, 10, 0)))]);
        assert!(cache.is_empty());
    }

    #[test]
    fn upsert_all_never_removes() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            event("a", utc(2024, 3, 15, 10, 0)),
            event("b", utc(2024, 3, 16, 10, 0)),
        ]);

        cache.upsert_all(vec![
            event("a", utc(2024, 3, 15, 12, 0)),
            cancelled("c", utc(2024, 3, 15, 13, 0)),
        ]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_none());
        assert_eq!(
            cache.get("a").unwrap().start,
            EventTime::from_utc(utc(2024, 3, 15, 12, 0))
        );
    }

    #[test]
    fn events_sorted_by_start_then_id() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            event("z", utc(2024, 3, 15, 10, 0)),
            event("a", utc(2024, 3, 15, 10, 0)),
            event("m", utc(2024, 3, 15, 9, 0)),
        ]);

        let ids: Vec<String> = cache
            .events_sorted(&chrono_tz::UTC)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["m", "a", "z"]);
    }

    #[test]
    fn all_day_events_sort_at_local_midnight() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            event("timed", utc(2024, 3, 15, 8, 0)),
            CalendarEvent::new(
                "allday",
                EventStatus::Confirmed,
                EventTime::all_day(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            ),
        ]);

        let ids: Vec<String> = cache
            .events_sorted(&chrono_tz::UTC)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["allday", "timed"]);
    }

    #[test]
    fn events_for_date_filters_by_reference_timezone() {
        let mut cache = EventCache::new();
        cache.replace_all(vec![
            // 20:00 UTC on the 14th is already the 15th in Seoul.
            event("late", utc(2024, 3, 14, 20, 0)),
            event("other", utc(2024, 3, 14, 8, 0)),
        ]);

        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let seoul = cache.events_for_date(date, &chrono_tz::Asia::Seoul);
        assert_eq!(seoul.len(), 1);
        assert_eq!(seoul[0].id, "late");

        assert!(cache.events_for_date(date, &chrono_tz::UTC).is_empty());
    }
}
