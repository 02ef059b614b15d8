//! The sync engine.
//!
//! [`SyncEngine`] owns the connection lifecycle end to end: the PKCE
//! authorization flow, token renewal, full and delta syncs with
//! cursor-invalidation recovery, the event cache, and the single-day
//! selection path. All collaborators (backend, browser, store, clock) are
//! injected, so the whole protocol runs under test without a network.
//!
//! Public operations never return errors; failures land in the engine's
//! status and `last_error` so callers can render them, while the cache keeps
//! serving the last good data.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use deltacal_core::{CalendarEvent, TimeWindow, date_key_in};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{SyncItem, TokenRequest};
use crate::backend::{AuthPollResult, BrowserOpener, CalendarBackend};
use crate::cache::EventCache;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fetch::{EventsQuery, fetch_all_pages};
use crate::pkce::PkceFlow;
use crate::store::{STATE_KEY, StateStore, StoredState};
use crate::tokens::{TokenManager, TokenSet};

/// Connection state of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No tokens; the cache is empty.
    #[default]
    Disconnected,
    /// An authorization flow is in progress.
    Connecting,
    /// Tokens are held and the last operation succeeded.
    Connected,
    /// The last operation failed; see `last_error`.
    Error,
}

impl ConnectionStatus {
    /// Returns the string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The calendar synchronization engine.
pub struct SyncEngine {
    config: EngineConfig,
    backend: Arc<dyn CalendarBackend>,
    browser: Arc<dyn BrowserOpener>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,

    status: ConnectionStatus,
    last_error: Option<String>,
    token_manager: TokenManager,
    calendar_id: String,
    sync_token: Option<String>,
    last_sync_at: Option<DateTime<Utc>>,
    cache: EventCache,
    selected_date: Option<NaiveDate>,
    is_syncing: bool,
}

impl SyncEngine {
    /// Creates a disconnected engine.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is structurally invalid.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn CalendarBackend>,
        browser: Arc<dyn BrowserOpener>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::internal)?;

        let token_manager = TokenManager::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
        );
        let calendar_id = config.calendar_id.clone();

        Ok(Self {
            config,
            backend,
            browser,
            store,
            clock,
            status: ConnectionStatus::Disconnected,
            last_error: None,
            token_manager,
            calendar_id,
            sync_token: None,
            last_sync_at: None,
            cache: EventCache::new(),
            selected_date: None,
            is_syncing: false,
        })
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Message of the last failed operation, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the last successful sync completed.
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    /// The current incremental sync cursor, if one is held.
    pub fn sync_token(&self) -> Option<&str> {
        self.sync_token.as_deref()
    }

    /// The currently selected date, if any.
    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    /// All cached events, ordered by resolved start (ties by id).
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.cache.events_sorted(&self.config.reference_timezone)
    }

    /// The cached events for the selected date, in start order.
    pub fn selected_events(&self) -> Vec<CalendarEvent> {
        match self.selected_date {
            Some(date) => self
                .cache
                .events_for_date(date, &self.config.reference_timezone),
            None => Vec::new(),
        }
    }

    /// Restores a previous connection from the state store.
    ///
    /// A missing or malformed record leaves the engine disconnected; store
    /// failures are logged and ignored.
    pub fn load_from_store(&mut self) {
        let value = match self.store.get(STATE_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("no persisted state");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read persisted state");
                return;
            }
        };

        let state: StoredState = match serde_json::from_value(value) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "persisted state is malformed, ignoring");
                return;
            }
        };
        let Some(tokens) = state.tokens else {
            return;
        };

        self.token_manager.set_tokens(tokens);
        if let Some(calendar_id) = state.calendar_id {
            self.calendar_id = calendar_id;
        }
        self.sync_token = state.sync_token;
        self.last_sync_at = state.last_sync_at;
        self.status = ConnectionStatus::Connected;
        info!("restored connection from persisted state");
    }

    /// Runs the full authorization flow: consent page, redirect poll, code
    /// exchange. On success the engine persists its tokens, performs an
    /// initial full sync, and selects today.
    pub async fn connect(&mut self) {
        if self.config.client_id.is_empty() {
            warn!("connect requested without a configured client id");
            self.status = ConnectionStatus::Error;
            self.last_error = Some("client id is not configured".to_string());
            return;
        }

        info!("starting authorization flow");
        self.status = ConnectionStatus::Connecting;
        self.last_error = None;

        match self.run_connect().await {
            Ok(()) => {
                self.status = ConnectionStatus::Connected;
                self.persist();
                self.sync_now().await;
                let today = date_key_in(self.clock.now(), &self.config.reference_timezone);
                self.select_date(today).await;
            }
            Err(e) => {
                warn!(error = %e, "authorization failed");
                self.status = ConnectionStatus::Error;
                self.last_error = Some(e.to_string());
            }
        }
    }

    async fn run_connect(&mut self) -> EngineResult<()> {
        let flow = PkceFlow::new();
        let auth_url = flow.build_auth_url(
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scopes,
        );
        self.browser.open(&auth_url)?;

        let code = self.poll_auth_code(&flow.state).await?;
        debug!("received authorization code, exchanging for tokens");

        let request = TokenRequest::authorization_code(
            code,
            flow.verifier,
            self.config.redirect_uri.clone(),
            self.config.client_id.clone(),
            self.config.client_secret.clone(),
        );
        let response = self.backend.exchange_token(request).await?;
        let tokens = TokenSet::from_response(&response, self.token_manager.tokens(), self.clock.now());
        self.token_manager.set_tokens(tokens);
        Ok(())
    }

    /// Polls the backend until the redirect result arrives or the flow
    /// times out.
    async fn poll_auth_code(&self, state: &str) -> EngineResult<String> {
        let deadline = tokio::time::Instant::now() + self.config.auth_timeout;
        loop {
            match self.backend.poll_auth_result(state).await? {
                AuthPollResult::Complete { code } => return Ok(code),
                AuthPollResult::Error { message } => return Err(EngineError::auth(message)),
                AuthPollResult::Pending => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::auth("authorization timed out"));
            }
            tokio::time::sleep(self.config.auth_poll_interval).await;
        }
    }

    /// Drops tokens, cache, and cursor, and clears the persisted record.
    pub fn disconnect(&mut self) {
        info!("disconnecting");
        self.token_manager.clear();
        self.cache.clear();
        self.sync_token = None;
        self.last_sync_at = None;
        self.selected_date = None;
        self.status = ConnectionStatus::Disconnected;
        self.last_error = None;

        if let Err(e) = self.store.set(STATE_KEY, Value::Null) {
            warn!(error = %e, "failed to clear persisted state");
        }
    }

    /// Runs one synchronization: delta when a cursor is held, full otherwise.
    ///
    /// An invalidated cursor triggers exactly one full-sync retry. A no-op
    /// when disconnected or when a sync is already in flight. On failure the
    /// cache and cursor keep their previous values.
    pub async fn sync_now(&mut self) {
        if self.is_syncing {
            debug!("sync already in flight, skipping");
            return;
        }
        if self.token_manager.tokens().is_none() {
            debug!("sync requested while disconnected, skipping");
            return;
        }

        self.is_syncing = true;
        let mut retried_full = false;
        loop {
            match self.run_sync().await {
                Ok(()) => {
                    self.status = ConnectionStatus::Connected;
                    self.last_error = None;
                    self.last_sync_at = Some(self.clock.now());
                    break;
                }
                Err(e) if e.is_sync_token_expired() && !retried_full => {
                    info!("sync cursor invalidated, falling back to full sync");
                    self.sync_token = None;
                    retried_full = true;
                }
                Err(e) => {
                    warn!(error = %e, "sync failed");
                    self.status = ConnectionStatus::Error;
                    self.last_error = Some(e.to_string());
                    break;
                }
            }
        }
        self.persist();
        self.is_syncing = false;
    }

    async fn run_sync(&mut self) -> EngineResult<()> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        let access = self
            .token_manager
            .ensure_access_token(backend.as_ref(), now)
            .await?;

        match self.sync_token.clone() {
            Some(cursor) => {
                let outcome = fetch_all_pages(
                    backend.as_ref(),
                    &access,
                    &self.calendar_id,
                    &EventsQuery::Delta(cursor.clone()),
                    self.config.page_size,
                )
                .await?;
                let (upserted, removed) = self.cache.apply(outcome.items);
                info!(upserted, removed, "delta sync complete");
                // An empty delta may omit the cursor; the old one stays valid.
                self.sync_token = outcome.next_sync_token.or(Some(cursor));
            }
            None => {
                let window = TimeWindow::around(
                    now,
                    self.config.sync_range_past_days,
                    self.config.sync_range_future_days,
                    &self.config.reference_timezone,
                );
                let outcome = fetch_all_pages(
                    backend.as_ref(),
                    &access,
                    &self.calendar_id,
                    &EventsQuery::Window(window),
                    self.config.page_size,
                )
                .await?;
                self.cache
                    .replace_all(outcome.items.into_iter().filter_map(SyncItem::into_event));
                info!(events = self.cache.len(), "full sync complete");
                self.sync_token = outcome.next_sync_token;
            }
        }
        Ok(())
    }

    /// Selects a date: fetches that day's events fresh, merges them into the
    /// cache, and returns the date's view.
    ///
    /// The fetch never removes events (a day window carries no tombstones);
    /// on failure the cached view is served as-is.
    pub async fn select_date(&mut self, date: NaiveDate) -> Vec<CalendarEvent> {
        self.selected_date = Some(date);

        if self.token_manager.tokens().is_none() {
            return self
                .cache
                .events_for_date(date, &self.config.reference_timezone);
        }

        match self.fetch_day(date).await {
            Ok(()) => {
                // A fresh day fetch is a successful operation: recover from
                // any earlier failure instead of showing a stale error.
                self.status = ConnectionStatus::Connected;
                self.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, %date, "day fetch failed, serving cached view");
                self.status = ConnectionStatus::Error;
                self.last_error = Some(e.to_string());
            }
        }
        self.persist();
        self.cache
            .events_for_date(date, &self.config.reference_timezone)
    }

    async fn fetch_day(&mut self, date: NaiveDate) -> EngineResult<()> {
        let backend = Arc::clone(&self.backend);
        let now = self.clock.now();
        let access = self
            .token_manager
            .ensure_access_token(backend.as_ref(), now)
            .await?;

        let window = TimeWindow::for_date(date, &self.config.reference_timezone);
        let outcome = fetch_all_pages(
            backend.as_ref(),
            &access,
            &self.calendar_id,
            &EventsQuery::Window(window),
            self.config.page_size,
        )
        .await?;
        self.cache
            .upsert_all(outcome.items.into_iter().filter_map(SyncItem::into_event));
        Ok(())
    }

    /// Writes the connection record to the state store; failures are logged
    /// and ignored.
    fn persist(&self) {
        let state = StoredState {
            tokens: self.token_manager.tokens().cloned(),
            calendar_id: Some(self.calendar_id.clone()),
            sync_token: self.sync_token.clone(),
            last_sync_at: self.last_sync_at,
        };
        let value = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to serialize state");
                return;
            }
        };
        if let Err(e) = self.store.set(STATE_KEY, value) {
            warn!(error = %e, "failed to persist state");
        }
    }
}
