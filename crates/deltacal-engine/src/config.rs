//! Engine configuration.

use std::time::Duration;

use chrono_tz::Tz;

/// Default OAuth scope: read-only calendar access.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Default calendar to sync.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Default redirect URI registered with the backend.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:31337/oauth/google/callback";

/// Default full-sync range: this many days back and ahead of today.
pub const DEFAULT_SYNC_RANGE_DAYS: i64 = 30;

/// Default page size for events requests.
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret, when the client has one.
    pub client_secret: Option<String>,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Which calendar to sync.
    pub calendar_id: String,
    /// Full-sync range: days before today.
    pub sync_range_past_days: i64,
    /// Full-sync range: days after today.
    pub sync_range_future_days: i64,
    /// Timezone used to resolve day boundaries and all-day events.
    pub reference_timezone: Tz,
    /// How often to poll for the OAuth redirect result.
    pub auth_poll_interval: Duration,
    /// How long to wait for the user to finish authorizing.
    pub auth_timeout: Duration,
    /// Maximum items per events page.
    pub page_size: u32,
    /// Timeout for individual backend requests.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            sync_range_past_days: DEFAULT_SYNC_RANGE_DAYS,
            sync_range_future_days: DEFAULT_SYNC_RANGE_DAYS,
            reference_timezone: chrono_tz::UTC,
            auth_poll_interval: Duration::from_secs(1),
            auth_timeout: Duration::from_secs(120),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Creates a config for the given OAuth client, defaults elsewhere.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the OAuth client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Sets the calendar to sync.
    #[must_use]
    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Sets the reference timezone for day boundaries.
    #[must_use]
    pub fn with_reference_timezone(mut self, tz: Tz) -> Self {
        self.reference_timezone = tz;
        self
    }

    /// Sets the full-sync range around today.
    #[must_use]
    pub fn with_sync_range(mut self, past_days: i64, future_days: i64) -> Self {
        self.sync_range_past_days = past_days;
        self.sync_range_future_days = future_days;
        self
    }

    /// Validates structural invariants of the configuration.
    ///
    /// The client id is deliberately not checked here; a missing client id
    /// surfaces as a connect-time error so a restored-but-unconfigured
    /// engine can still serve its cache.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.redirect_uri.is_empty() {
            return Err("redirect_uri must not be empty".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.calendar_id.is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.sync_range_past_days < 0 || self.sync_range_future_days < 0 {
            return Err("sync range days must be non-negative".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be positive".to_string());
        }
        Ok(())
    }
}
