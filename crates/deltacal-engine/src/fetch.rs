//! Paginated event fetching.
//!
//! Drives the events listing through its page sequence: follow
//! `nextPageToken` until a page arrives without one, accumulate converted
//! items, and take the sync cursor only from that final page. A 410 from any
//! page aborts the whole sequence with a cursor-expiry error so the caller
//! can fall back to a full sync.

use deltacal_core::TimeWindow;
use tracing::{debug, warn};

use crate::api::{ApiEvent, EventsRequest, SyncItem};
use crate::backend::CalendarBackend;
use crate::error::{EngineError, EngineResult};

/// What to ask the events listing for.
#[derive(Debug, Clone)]
pub enum EventsQuery {
    /// Every event in a time window (full or single-day fetch).
    Window(TimeWindow),
    /// Changes since a sync cursor (delta fetch).
    Delta(String),
}

/// The result of a complete paginated fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// All items across all pages, in arrival order.
    pub items: Vec<SyncItem>,
    /// The cursor from the final page, if the provider issued one.
    pub next_sync_token: Option<String>,
}

/// Fetches every page of an events listing.
///
/// # Errors
///
/// Returns [`EngineError::sync_token_expired`] when any page comes back 410,
/// and [`EngineError::fetch`] for any other non-success page. On error no
/// partial results are returned.
pub async fn fetch_all_pages(
    backend: &dyn CalendarBackend,
    access_token: &str,
    calendar_id: &str,
    query: &EventsQuery,
    max_results: u32,
) -> EngineResult<FetchOutcome> {
    let base_request = match query {
        EventsQuery::Window(window) => {
            EventsRequest::windowed(access_token, calendar_id, window, max_results)
        }
        EventsQuery::Delta(cursor) => {
            EventsRequest::delta(access_token, calendar_id, cursor.clone(), max_results)
        }
    };

    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = match page_token.take() {
            Some(token) => base_request.clone().with_page_token(token),
            None => base_request.clone(),
        };
        let page = backend.list_events(request).await?;
        pages += 1;

        if page.is_gone() {
            warn!("sync cursor rejected by provider (410)");
            return Err(EngineError::sync_token_expired(
                "sync cursor is no longer valid",
            ));
        }
        if !page.is_success() {
            let message = page
                .body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "events request failed".to_string());
            return Err(EngineError::fetch(format!(
                "events request failed ({}): {}",
                page.http_status, message
            )));
        }

        items.extend(page.body.items.into_iter().filter_map(ApiEvent::into_item));

        match page.body.next_page_token {
            Some(token) => page_token = Some(token),
            None => {
                // Terminal page: its nextSyncToken is the only one that counts.
                debug!(pages, items = items.len(), "fetch complete");
                return Ok(FetchOutcome {
                    items,
                    next_sync_token: page.body.next_sync_token,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use crate::api::{
        ApiError, EventsPage, EventsPageBody, TokenRequest, TokenResponse,
    };
    use crate::backend::{AuthPollResult, BoxFuture};
    use crate::error::EngineErrorCode;

    /// Backend that serves a scripted page sequence and records requests.
    struct PagedBackend {
        pages: Mutex<Vec<EventsPage>>,
        requests: Mutex<Vec<EventsRequest>>,
    }

    impl PagedBackend {
        fn new(pages: Vec<EventsPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<EventsRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl CalendarBackend for PagedBackend {
        fn poll_auth_result(&self, _state: &str) -> BoxFuture<'_, EngineResult<AuthPollResult>> {
            unimplemented!("not used by fetch tests")
        }

        fn exchange_token(
            &self,
            _request: TokenRequest,
        ) -> BoxFuture<'_, EngineResult<TokenResponse>> {
            unimplemented!("not used by fetch tests")
        }

        fn list_events(&self, request: EventsRequest) -> BoxFuture<'_, EngineResult<EventsPage>> {
            self.requests.lock().unwrap().push(request);
            let mut pages = self.pages.lock().unwrap();
            let page = if pages.is_empty() {
                EventsPage {
                    http_status: 500,
                    body: EventsPageBody::default(),
                }
            } else {
                pages.remove(0)
            };
            Box::pin(async move { Ok(page) })
        }
    }

    fn api_event(id: &str) -> ApiEvent {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "start": {"dateTime": "2024-03-15T10:00:00Z"}
        }))
        .unwrap()
    }

    fn page(
        ids: &[&str],
        next_page_token: Option<&str>,
        next_sync_token: Option<&str>,
    ) -> EventsPage {
        EventsPage {
            http_status: 200,
            body: EventsPageBody {
                items: ids.iter().map(|id| api_event(id)).collect(),
                next_page_token: next_page_token.map(str::to_string),
                next_sync_token: next_sync_token.map(str::to_string),
                error: None,
            },
        }
    }

    fn window_query() -> EventsQuery {
        EventsQuery::Window(TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn follows_pagination_to_the_final_page() {
        let backend = PagedBackend::new(vec![
            // Intermediate cursor must be ignored.
            page(&["a", "b"], Some("p2"), Some("stale-cursor")),
            page(&["c"], Some("p3"), None),
            page(&["d"], None, Some("cursor-final")),
        ]);

        let outcome = fetch_all_pages(&backend, "at", "primary", &window_query(), 250)
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.next_sync_token.as_deref(), Some("cursor-final"));

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].page_token.is_none());
        assert_eq!(requests[1].page_token.as_deref(), Some("p2"));
        assert_eq!(requests[2].page_token.as_deref(), Some("p3"));
        // The window parameters repeat on every page request.
        assert!(requests.iter().all(|r| r.time_min.is_some()));
    }

    #[tokio::test]
    async fn delta_requests_carry_the_cursor() {
        let backend = PagedBackend::new(vec![page(&["a"], None, Some("cursor-2"))]);

        let outcome = fetch_all_pages(
            &backend,
            "at",
            "primary",
            &EventsQuery::Delta("cursor-1".to_string()),
            250,
        )
        .await
        .unwrap();

        assert_eq!(outcome.next_sync_token.as_deref(), Some("cursor-2"));
        let requests = backend.requests();
        assert_eq!(requests[0].sync_token.as_deref(), Some("cursor-1"));
        assert!(requests[0].time_min.is_none());
    }

    #[tokio::test]
    async fn gone_maps_to_cursor_expiry() {
        let backend = PagedBackend::new(vec![EventsPage {
            http_status: 410,
            body: EventsPageBody::default(),
        }]);

        let err = fetch_all_pages(
            &backend,
            "at",
            "primary",
            &EventsQuery::Delta("cursor-1".to_string()),
            250,
        )
        .await
        .unwrap_err();

        assert!(err.is_sync_token_expired());
    }

    #[tokio::test]
    async fn non_success_surfaces_the_provider_message() {
        let backend = PagedBackend::new(vec![EventsPage {
            http_status: 403,
            body: EventsPageBody {
                error: Some(ApiError {
                    message: Some("insufficient permissions".to_string()),
                }),
                ..Default::default()
            },
        }]);

        let err = fetch_all_pages(&backend, "at", "primary", &window_query(), 250)
            .await
            .unwrap_err();

        assert_eq!(err.code, EngineErrorCode::Fetch);
        assert!(err.message.contains("403"));
        assert!(err.message.contains("insufficient permissions"));
    }

    #[tokio::test]
    async fn empty_terminal_page_yields_no_cursor() {
        let backend = PagedBackend::new(vec![page(&[], None, None)]);

        let outcome = fetch_all_pages(&backend, "at", "primary", &window_query(), 250)
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
        assert!(outcome.next_sync_token.is_none());
    }
}
