//! Durable client-side key-value storage and the typed vote record on top of it.
//!
//! Stores have no expiry of their own. The record carries its timestamp and
//! the reader decides whether it is still fresh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Result, SitevoteError};

/// Prefix of the storage key for an item's vote record.
const RECORD_KEY_PREFIX: &str = "voted-";

/// A string-to-string store scoped to one client.
pub trait LocalStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a JSON object in a single file.
///
/// The whole map is rewritten on every `set` through a temporary file and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                SitevoteError::Storage(format!("corrupt store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened local vote store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&entries) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// When this client last had a vote for an item accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVoteRecord {
    pub last_vote: DateTime<Utc>,
}

impl LocalVoteRecord {
    /// Storage key for an item's record.
    pub fn storage_key(item: &str) -> String {
        format!("{}{}", RECORD_KEY_PREFIX, item)
    }

    /// Read the record for `item`. Values that are not epoch milliseconds
    /// count as no record.
    pub fn load(store: &dyn LocalStore, item: &str) -> Result<Option<Self>> {
        let value = store.get(&Self::storage_key(item))?;
        Ok(value.as_deref().and_then(Self::decode))
    }

    /// Write this record for `item`.
    pub fn save(&self, store: &dyn LocalStore, item: &str) -> Result<()> {
        store.set(&Self::storage_key(item), &self.encode())
    }

    /// Stored form: Unix epoch milliseconds as a decimal string.
    pub fn encode(&self) -> String {
        self.last_vote.timestamp_millis().to_string()
    }

    fn decode(value: &str) -> Option<Self> {
        let millis: i64 = value.trim().parse().ok()?;
        DateTime::from_timestamp_millis(millis).map(|last_vote| Self { last_vote })
    }
}
