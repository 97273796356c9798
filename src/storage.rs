//! State persistence for Otakuverse
//!
//! All durable state (sessions, custom personas, settings, the daily
//! quota record) lives in a small key/value store behind the
//! [`StateStore`] trait. The production implementation is an embedded
//! `sled` database; tests use an in-memory map. Values are serialized
//! with `serde_json`.

use crate::error::{OtakuError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Well-known keys of the persisted state contract
///
/// These are the exact keys the core depends on; shapes are documented
/// on the types that serialize into them.
pub mod keys {
    /// JSON array of [`crate::session::ChatSession`]
    pub const SESSIONS: &str = "sessions";
    /// Identifier of the currently open session, if any
    pub const ACTIVE_SESSION: &str = "active_session";
    /// JSON array of [`crate::persona::Persona`] (user-discovered characters)
    pub const CUSTOM_CHARACTERS: &str = "custom_characters";
    /// Selected provider tag ("groq", "gemini", "huggingface")
    pub const PROVIDER: &str = "provider";
    /// Per-provider API keys
    pub const GROQ_KEY: &str = "groq_key";
    pub const GEMINI_KEY: &str = "gemini_key";
    pub const HF_KEY: &str = "hf_key";
    /// Per-provider model identifiers
    pub const GROQ_MODEL: &str = "groq_model";
    pub const GEMINI_MODEL: &str = "gemini_model";
    pub const HF_MODEL: &str = "hf_model";
    /// `{"date": "YYYY-MM-DD", "count": u32}` daily quota record
    pub const DAILY_QUOTA: &str = "daily_quota";
    /// User avatar URL and UI theme
    pub const USER_AVATAR: &str = "user_avatar";
    pub const THEME: &str = "theme";
}

/// Raw byte-oriented key/value port
///
/// Implementations only need get/put/remove; typed access goes through
/// [`Storage`].
pub trait StateStore: Send + Sync {
    /// Fetch the raw bytes stored under a key
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store raw bytes under a key, replacing any previous value
    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Sled-backed store used by the CLI
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create a store at the given path
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::Storage` if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::storage::SledStore;
    ///
    /// # fn main() -> otakuverse::error::Result<()> {
    /// let dir = tempfile::TempDir::new()?;
    /// let store = SledStore::open(dir.path().join("state.db"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| OtakuError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

impl StateStore for SledStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| OtakuError::Storage(format!("Get failed: {}", e)))?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| OtakuError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| OtakuError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| OtakuError::Storage(format!("Remove failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| OtakuError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let map = self
            .map
            .lock()
            .map_err(|_| OtakuError::Storage("Poisoned store lock".to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| OtakuError::Storage("Poisoned store lock".to_string()))?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| OtakuError::Storage("Poisoned store lock".to_string()))?;
        map.remove(key);
        Ok(())
    }
}

/// Typed handle over a [`StateStore`]
///
/// Cheap to clone; all stores and the engine share one handle.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<dyn StateStore>,
}

impl Storage {
    /// Wrap a raw store
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { inner: store }
    }

    /// Open a sled-backed store in the application data directory
    ///
    /// Honors the `OTAKUVERSE_DATA_DIR` environment variable as an
    /// override, otherwise resolves a platform data directory via
    /// `directories`.
    pub fn open_default() -> Result<Self> {
        let path = default_data_path()?;
        tracing::debug!("Opening state store at {}", path.display());
        Ok(Self::new(Arc::new(SledStore::open(path)?)))
    }

    /// Open a sled-backed store at an explicit path
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(SledStore::open(path)?)))
    }

    /// In-memory storage, used by unit tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Load and deserialize a JSON value
    ///
    /// # Errors
    ///
    /// Returns `OtakuError::Storage` when a stored value cannot be
    /// deserialized into `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get_raw(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    OtakuError::Storage(format!("Deserialization failed for '{}': {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize and store a JSON value
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            OtakuError::Storage(format!("Serialization failed for '{}': {}", key, e))
        })?;
        self.inner.put_raw(key, bytes)
    }

    /// Load a plain string value
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_json(key)
    }

    /// Store a plain string value
    pub fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.put_json(key, &value)
    }

    /// Remove a key
    pub fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}

/// Resolve the default sled database path
fn default_data_path() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("OTAKUVERSE_DATA_DIR") {
        return Ok(PathBuf::from(dir).join("state.db"));
    }

    let dirs = directories::ProjectDirs::from("org", "otakuverse", "otakuverse")
        .ok_or_else(|| OtakuError::Storage("Could not resolve a data directory".to_string()))?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("state.db"))
}
