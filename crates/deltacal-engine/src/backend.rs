//! Backend and browser seams.
//!
//! [`CalendarBackend`] is the engine's only door to the network: the auth
//! result poll, the token exchange proxy, and the events listing proxy.
//! [`BrowserOpener`] abstracts launching the consent page. Both are traits so
//! tests can script the whole protocol without sockets.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::api::{EventsPage, EventsRequest, TokenRequest, TokenResponse};
use crate::error::{EngineError, EngineResult};

/// A boxed future type for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of polling the backend for the OAuth redirect result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPollResult {
    /// The redirect has not arrived yet.
    Pending,
    /// The user granted access; here is the authorization code.
    Complete { code: String },
    /// The user denied access or the provider reported an error.
    Error { message: String },
}

/// The backend service the engine talks to.
pub trait CalendarBackend: Send + Sync {
    /// Polls for the OAuth redirect result correlated by `state`.
    fn poll_auth_result(&self, state: &str) -> BoxFuture<'_, EngineResult<AuthPollResult>>;

    /// Exchanges an authorization code or refresh token for tokens.
    fn exchange_token(&self, request: TokenRequest) -> BoxFuture<'_, EngineResult<TokenResponse>>;

    /// Lists one page of calendar events.
    fn list_events(&self, request: EventsRequest) -> BoxFuture<'_, EngineResult<EventsPage>>;
}

/// Opens a URL in the user's browser.
pub trait BrowserOpener: Send + Sync {
    /// Opens `url` for the user.
    fn open(&self, url: &str) -> EngineResult<()>;
}

/// [`BrowserOpener`] backed by the system default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> EngineResult<()> {
        open::that(url)
            .map_err(|e| EngineError::auth("failed to open browser").with_source(e))
    }
}

/// Wire shape of the auth result poll response.
#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PollResponse {
    fn into_result(self) -> EngineResult<AuthPollResult> {
        match self.status.as_str() {
            "pending" => Ok(AuthPollResult::Pending),
            "complete" => match self.code {
                Some(code) => Ok(AuthPollResult::Complete { code }),
                None => Err(EngineError::auth("auth result complete without a code")),
            },
            "error" => Ok(AuthPollResult::Error {
                message: self
                    .error
                    .unwrap_or_else(|| "authorization failed".to_string()),
            }),
            other => Err(EngineError::auth(format!(
                "unexpected auth result status: {other}"
            ))),
        }
    }
}

/// [`CalendarBackend`] over HTTP, talking to the backend proxy service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Creates a backend client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            base_url: base_url.into(),
            http_client,
        }
    }

    async fn poll_auth_result_inner(&self, state: &str) -> EngineResult<AuthPollResult> {
        let url = format!(
            "{}/oauth/google/result?state={}",
            self.base_url,
            urlencoding::encode(state)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::auth("auth result request failed").with_source(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::auth(format!(
                "auth result request failed ({status})"
            )));
        }

        let body: PollResponse = response
            .json()
            .await
            .map_err(|e| EngineError::auth("invalid auth result response").with_source(e))?;
        body.into_result()
    }

    async fn exchange_token_inner(&self, request: TokenRequest) -> EngineResult<TokenResponse> {
        let url = format!("{}/integrations/google/token", self.base_url);
        debug!(grant_type = %request.grant_type, "exchanging token");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::token("token request failed").with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::token("failed to read token response").with_source(e))?;

        if !status.is_success() {
            return Err(EngineError::token(format!(
                "token exchange failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| EngineError::token("invalid token response").with_source(e))
    }

    async fn list_events_inner(&self, request: EventsRequest) -> EngineResult<EventsPage> {
        let url = format!("{}/integrations/google/events", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::fetch("events request failed").with_source(e))?;

        let http_status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::fetch("failed to read events response").with_source(e))?;

        parse_events_page(http_status, &text)
    }
}

/// Builds an [`EventsPage`] from a relayed provider response.
///
/// A success status must carry a page-shaped body; a garbled body there is
/// a fetch error, never an empty page. Error bodies are relayed verbatim
/// and need not be page-shaped, so they parse leniently — the caller
/// branches on the status for those.
fn parse_events_page(http_status: u16, text: &str) -> EngineResult<EventsPage> {
    let body = if (200..300).contains(&http_status) {
        serde_json::from_str(text)
            .map_err(|e| EngineError::fetch("invalid events response body").with_source(e))?
    } else {
        serde_json::from_str(text).unwrap_or_default()
    };
    Ok(EventsPage { http_status, body })
}

impl CalendarBackend for HttpBackend {
    fn poll_auth_result(&self, state: &str) -> BoxFuture<'_, EngineResult<AuthPollResult>> {
        let state = state.to_string();
        Box::pin(async move { self.poll_auth_result_inner(&state).await })
    }

    fn exchange_token(&self, request: TokenRequest) -> BoxFuture<'_, EngineResult<TokenResponse>> {
        Box::pin(self.exchange_token_inner(request))
    }

    fn list_events(&self, request: EventsRequest) -> BoxFuture<'_, EngineResult<EventsPage>> {
        Box::pin(self.list_events_inner(request))
    }
}
