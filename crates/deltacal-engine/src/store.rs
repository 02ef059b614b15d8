//! Persisted engine state.
//!
//! The engine survives restarts through a small key-value [`StateStore`]:
//! one JSON record per key. [`JsonFileStore`] is the production store (a
//! single JSON file written atomically with restrictive permissions);
//! [`MemoryStore`] backs tests and headless use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::tokens::TokenSet;

/// Store key under which the engine keeps its connection record.
pub const STATE_KEY: &str = "calendar.sync";

/// The persisted connection record.
///
/// `None` tokens means disconnected; the other fields are meaningless then.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredState {
    /// The token set, when connected.
    pub tokens: Option<TokenSet>,
    /// Which calendar is being synced.
    pub calendar_id: Option<String>,
    /// The incremental sync cursor, when one is held.
    pub sync_token: Option<String>,
    /// When the last successful sync completed.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// A key-value store for engine state.
pub trait StateStore: Send + Sync {
    /// Reads the record at `key`, if present.
    fn get(&self, key: &str) -> EngineResult<Option<Value>>;

    /// Writes the record at `key`. `Value::Null` clears it.
    fn set(&self, key: &str, value: Value) -> EngineResult<()>;
}

/// [`StateStore`] backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl JsonFileStore {
    /// Opens (or initializes) a store at `path`, loading any existing file.
    pub fn open(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| EngineError::persistence("failed to read state file").with_source(e))?;
            serde_json::from_str(&content)
                .map_err(|e| EngineError::persistence("failed to parse state file").with_source(e))?
        } else {
            debug!(path = %path.display(), "no state file yet");
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// The default store path under the user config directory.
    pub fn default_path() -> EngineResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| EngineError::persistence("could not determine config directory"))?;
        Ok(base.join("deltacal").join("state.json"))
    }

    /// Returns the file path backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, Value>) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::persistence("failed to create state directory").with_source(e)
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| EngineError::persistence("failed to serialize state").with_source(e))?;

        fs::write(&temp_path, &content)
            .map_err(|e| EngineError::persistence("failed to write state file").with_source(e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| EngineError::persistence("failed to rename state file").with_source(e))?;

        // Restrictive permissions: the record contains tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!(path = %self.path.display(), "saved state");
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> EngineResult<()> {
        let mut entries = self.entries.write().unwrap();
        if value.is_null() {
            if entries.remove(key).is_some() {
                info!(key, "cleared state record");
            }
        } else {
            entries.insert(key.to_string(), value);
        }
        self.save(&entries)
    }
}

/// In-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> EngineResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if value.is_null() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), value);
        }
        Ok(())
    }
}
