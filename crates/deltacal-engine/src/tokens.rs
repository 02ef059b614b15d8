//! Access and refresh token lifecycle.
//!
//! A [`TokenSet`] carries the access token with an absolute expiry instant
//! (the provider's relative `expires_in` is resolved at receipt time, minus a
//! safety margin). The [`TokenManager`] hands out a valid access token,
//! refreshing through the backend proxy when the stored one has expired.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{TokenRequest, TokenResponse};
use crate::backend::CalendarBackend;
use crate::error::{EngineError, EngineResult};

/// Safety margin subtracted from the provider-reported expiry so a token is
/// refreshed before it actually lapses mid-request.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// A set of OAuth tokens with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    /// The bearer access token.
    pub access_token: String,
    /// The refresh token, when one has been issued.
    pub refresh_token: Option<String>,
    /// Instant after which the access token is treated as expired.
    pub expires_at: DateTime<Utc>,
    /// Granted scopes.
    pub scope: Option<String>,
    /// Token type, typically `Bearer`.
    pub token_type: Option<String>,
}

impl TokenSet {
    /// Builds a token set from a token endpoint response received at `now`.
    ///
    /// The expiry is `now + expires_in - margin`, clamped to never lie in the
    /// past. A response that omits the refresh token (as refresh responses
    /// routinely do) keeps the one from `previous`.
    pub fn from_response(
        response: &TokenResponse,
        previous: Option<&TokenSet>,
        now: DateTime<Utc>,
    ) -> Self {
        let ttl = Duration::seconds(response.expires_in.unwrap_or(0));
        let expires_at = (now + ttl - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS)).max(now);

        Self {
            access_token: response.access_token.clone(),
            refresh_token: response
                .refresh_token
                .clone()
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at,
            scope: response.scope.clone(),
            token_type: response.token_type.clone(),
        }
    }

    /// Returns `true` if the access token should no longer be used at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Owns the current [`TokenSet`] and keeps the access token fresh.
#[derive(Debug)]
pub struct TokenManager {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    tokens: Option<TokenSet>,
}

impl TokenManager {
    /// Creates a manager for the given OAuth client.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            tokens: None,
        }
    }

    /// Returns the current token set, if connected.
    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    /// Installs a token set (after connect or restore).
    pub fn set_tokens(&mut self, tokens: TokenSet) {
        self.tokens = Some(tokens);
    }

    /// Drops the stored tokens (disconnect).
    pub fn clear(&mut self) {
        self.tokens = None;
    }

    /// Returns a valid access token as of `now`, refreshing through `backend`
    /// if the stored one has expired.
    ///
    /// # Errors
    ///
    /// Fails when no tokens are stored, the client is not configured, the
    /// refresh token is missing, or the refresh exchange fails.
    pub async fn ensure_access_token(
        &mut self,
        backend: &dyn CalendarBackend,
        now: DateTime<Utc>,
    ) -> EngineResult<String> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or_else(|| EngineError::token("no tokens stored"))?;

        if !tokens.is_expired(now) {
            debug!(expires_at = %tokens.expires_at, "access token still valid");
            return Ok(tokens.access_token.clone());
        }

        if self.client_id.is_empty() {
            return Err(EngineError::token("client is not configured"));
        }
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or_else(|| EngineError::token("refresh token missing"))?;

        info!("access token expired, refreshing");
        let request = TokenRequest::refresh(
            refresh_token,
            self.redirect_uri.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        );
        let response = backend.exchange_token(request).await?;

        let renewed = TokenSet::from_response(&response, self.tokens.as_ref(), now);
        let access_token = renewed.access_token.clone();
        self.tokens = Some(renewed);
        Ok(access_token)
    }
}
