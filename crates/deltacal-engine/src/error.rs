//! Error types for the sync engine.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// An error produced by the sync engine or one of its collaborators.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct EngineError {
    /// Machine-readable error code.
    pub code: EngineErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    /// Creates a new error with the given code and message.
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Authorization failed: user denied, flow timed out, or the client is
    /// misconfigured.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Auth, message)
    }

    /// Token lifecycle failure: missing tokens, missing refresh token, or a
    /// failed token exchange.
    pub fn token(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Token, message)
    }

    /// The incremental sync cursor was rejected by the provider and a full
    /// resynchronization is required.
    pub fn sync_token_expired(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::SyncTokenExpired, message)
    }

    /// An events request failed with a non-success response.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Fetch, message)
    }

    /// Reading or writing persisted state failed.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Persistence, message)
    }

    /// An unexpected internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Internal, message)
    }

    /// Returns `true` if this error signals an invalidated sync cursor.
    pub fn is_sync_token_expired(&self) -> bool {
        self.code == EngineErrorCode::SyncTokenExpired
    }
}

/// Machine-readable error codes for [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// Authorization flow failure.
    Auth,
    /// Token lifecycle failure.
    Token,
    /// The incremental sync cursor is no longer valid.
    SyncTokenExpired,
    /// Events request failure.
    Fetch,
    /// Persisted state could not be read or written.
    Persistence,
    /// Unexpected internal failure.
    Internal,
}

impl EngineErrorCode {
    /// Returns the string form of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth_failed",
            Self::Token => "token_error",
            Self::SyncTokenExpired => "sync_token_expired",
            Self::Fetch => "fetch_failed",
            Self::Persistence => "persistence_failed",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = EngineError::fetch("events request failed (500)");
        assert_eq!(
            err.to_string(),
            "[fetch_failed] events request failed (500)"
        );
    }

    #[test]
    fn sync_token_expiry_detection() {
        assert!(EngineError::sync_token_expired("cursor rejected").is_sync_token_expired());
        assert!(!EngineError::fetch("boom").is_sync_token_expired());
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = EngineError::persistence("failed to write state").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
