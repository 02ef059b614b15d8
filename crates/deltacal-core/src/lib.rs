//! Core types for the deltacal sync engine.
//!
//! This crate holds the domain model shared by every consumer of the engine:
//! calendar events with their two time shapes (precise datetime vs. all-day
//! date), time windows for range queries, and the tracing setup used by the
//! whole workspace.

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, EventStatus, EventTime};
pub use time::{TimeWindow, date_key_in, local_midnight_utc};
