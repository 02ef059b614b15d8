//! Incremental calendar synchronization engine.
//!
//! This crate keeps a local mirror of a Google calendar fresh with the
//! minimum of network traffic:
//!
//! - **Authorization**: OAuth 2.0 Authorization Code flow with PKCE. The
//!   engine opens the consent page and polls the backend for the redirect
//!   result; no local callback server is needed.
//! - **Tokens**: access tokens carry an absolute expiry (with a safety
//!   margin) and are refreshed proactively through the backend proxy.
//! - **Sync**: a full windowed sync bootstraps the cache and yields a sync
//!   cursor; later syncs fetch only the delta since that cursor, including
//!   cancellation tombstones. An invalidated cursor (410) falls back to one
//!   full resynchronization.
//! - **Cache**: events keyed by id, served sorted by resolved start, with a
//!   single-day selection path that refreshes one day without disturbing the
//!   rest of the cache.
//!
//! ```text
//!                    +--------------+
//!   connect() -----> |              | ---> browser (consent page)
//!   sync_now() ----> |  SyncEngine  | ---> backend proxy (poll/token/events)
//!   select_date() -> |              | ---> state store (tokens + cursor)
//!                    +--------------+
//!                           |
//!                      EventCache
//! ```
//!
//! All collaborators are injected behind traits ([`CalendarBackend`],
//! [`BrowserOpener`], [`StateStore`], [`Clock`]), so the whole protocol is
//! testable without a network. The [`Poller`] drives `sync_now` on an
//! interval for long-running processes.

pub mod api;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod pkce;
pub mod poller;
pub mod store;
pub mod tokens;

pub use backend::{
    AuthPollResult, BoxFuture, BrowserOpener, CalendarBackend, HttpBackend, SystemBrowser,
};
pub use clock::{Clock, SystemClock};
pub use config::EngineConfig;
pub use engine::{ConnectionStatus, SyncEngine};
pub use error::{EngineError, EngineErrorCode, EngineResult};
pub use poller::{Poller, PollerConfig, PollerHandle};
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use tokens::TokenSet;
