//! Wire types for the backend proxy API.
//!
//! The engine never talks to Google directly; it goes through a backend
//! service that proxies the token endpoint and the events listing. These
//! types mirror that proxy's JSON contract (camelCase request bodies, the
//! provider's own casing on token responses) and convert provider events
//! into the canonical [`CalendarEvent`] model.

use chrono::DateTime;
use deltacal_core::{CalendarEvent, EventStatus, EventTime, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A request to the token exchange proxy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// OAuth grant type: `authorization_code` or `refresh_token`.
    pub grant_type: String,
    /// Authorization code (code exchange only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// PKCE code verifier (code exchange only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    /// Refresh token (refresh only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// The redirect URI registered for the client.
    pub redirect_uri: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret, when the client has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl TokenRequest {
    /// Builds an authorization-code exchange request.
    pub fn authorization_code(
        code: impl Into<String>,
        verifier: impl Into<String>,
        redirect_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            grant_type: "authorization_code".to_string(),
            code: Some(code.into()),
            code_verifier: Some(verifier.into()),
            refresh_token: None,
            redirect_uri: redirect_uri.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Builds a refresh-token request.
    pub fn refresh(
        refresh_token: impl Into<String>,
        redirect_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            code: None,
            code_verifier: None,
            refresh_token: Some(refresh_token.into()),
            redirect_uri: redirect_uri.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }
}

/// A response from the token endpoint (provider casing).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The bearer access token.
    pub access_token: String,
    /// A refresh token, when the provider issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Token type, typically `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A request to the events listing proxy.
///
/// Exactly one of `time_min`/`time_max` (windowed) or `sync_token` (delta) is
/// set per request; `page_token` continues a paginated sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsRequest {
    /// Bearer token for the provider call.
    pub access_token: String,
    /// Which calendar to list.
    pub calendar_id: String,
    /// Window start (RFC 3339), windowed fetches only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_min: Option<String>,
    /// Window end (RFC 3339), windowed fetches only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_max: Option<String>,
    /// Incremental sync cursor, delta fetches only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    /// Continuation token within a paginated sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Maximum items per page.
    pub max_results: u32,
}

impl EventsRequest {
    /// Builds a windowed (full or single-day) listing request.
    pub fn windowed(
        access_token: impl Into<String>,
        calendar_id: impl Into<String>,
        window: &TimeWindow,
        max_results: u32,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            calendar_id: calendar_id.into(),
            time_min: Some(window.start.to_rfc3339()),
            time_max: Some(window.end.to_rfc3339()),
            sync_token: None,
            page_token: None,
            max_results,
        }
    }

    /// Builds a delta listing request against a sync cursor.
    pub fn delta(
        access_token: impl Into<String>,
        calendar_id: impl Into<String>,
        sync_token: impl Into<String>,
        max_results: u32,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            calendar_id: calendar_id.into(),
            time_min: None,
            time_max: None,
            sync_token: Some(sync_token.into()),
            page_token: None,
            max_results,
        }
    }

    /// Returns a copy of this request continuing at `page_token`.
    pub fn with_page_token(mut self, page_token: impl Into<String>) -> Self {
        self.page_token = Some(page_token.into());
        self
    }
}

/// One page of the events listing, with the proxied HTTP status attached.
///
/// The status is part of the page because the sync protocol branches on it:
/// 410 Gone means the sync cursor was invalidated upstream.
#[derive(Debug, Clone)]
pub struct EventsPage {
    /// HTTP status the proxy relayed from the provider.
    pub http_status: u16,
    /// Parsed page body (empty when the body was not page-shaped).
    pub body: EventsPageBody,
}

impl EventsPage {
    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    /// Returns `true` when the provider rejected the sync cursor.
    pub fn is_gone(&self) -> bool {
        self.http_status == 410
    }
}

/// The JSON body of an events page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventsPageBody {
    /// Events on this page.
    pub items: Vec<ApiEvent>,
    /// Continuation token; present on every page but the last.
    pub next_page_token: Option<String>,
    /// Next sync cursor; authoritative only on the final page.
    pub next_sync_token: Option<String>,
    /// Error payload on non-success responses.
    pub error: Option<ApiError>,
}

/// Error payload the proxy relays on failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiError {
    /// Human-readable message, if the provider sent one.
    pub message: Option<String>,
}

/// An event as the provider serializes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    pub updated: Option<String>,
}

/// Provider event time: either `date` (all-day) or `dateTime` is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

/// One item of a sync response after conversion: either an event to upsert
/// or a tombstone naming an id to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncItem {
    /// A live event to insert or replace in the cache.
    Event(CalendarEvent),
    /// A cancelled event; only the id survives on the wire.
    Tombstone(String),
}

impl SyncItem {
    /// Returns the contained event, dropping tombstones.
    pub fn into_event(self) -> Option<CalendarEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Tombstone(_) => None,
        }
    }
}

impl ApiEvent {
    /// Converts a provider event into a [`SyncItem`].
    ///
    /// Cancelled events become tombstones regardless of which other fields
    /// the provider included. Events without an id, or live events without a
    /// parseable start, are logged and dropped.
    pub fn into_item(self) -> Option<SyncItem> {
        let Some(id) = self.id else {
            warn!("skipping event without id");
            return None;
        };

        if self.status.as_deref() == Some("cancelled") {
            return Some(SyncItem::Tombstone(id));
        }

        let Some(start) = self.start.as_ref().and_then(ApiEventTime::to_event_time) else {
            warn!(event_id = %id, "skipping event without a parseable start");
            return None;
        };

        let status = match self.status.as_deref() {
            Some("tentative") => EventStatus::Tentative,
            _ => EventStatus::Confirmed,
        };

        let mut event = CalendarEvent::new(id, status, start);
        event.summary = self.summary;
        event.description = self.description;
        event.location = self.location;
        event.end = self.end.as_ref().and_then(ApiEventTime::to_event_time);
        event.updated = self
            .updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.to_utc());

        Some(SyncItem::Event(event))
    }
}

impl ApiEventTime {
    /// Parses the provider time into an [`EventTime`], preferring the
    /// precise `dateTime` when both fields are present.
    fn to_event_time(&self) -> Option<EventTime> {
        if let Some(dt) = self.date_time.as_deref() {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|dt| EventTime::from_utc(dt.to_utc()));
        }
        let date = self.date.as_deref()?.parse().ok()?;
        Some(match self.time_zone.clone() {
            Some(tz) => EventTime::all_day_in(date, tz),
            None => EventTime::all_day(date),
        })
    }
}
