//! Client-side key-value store.
//!
//! The board persists a handful of string values (the tracked repository
//! list, the auto-refresh flag). Each write replaces the value for its key;
//! there is no merging or versioning.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Key holding the JSON array of tracked repositories.
pub const ADDED_REPOS_KEY: &str = "addedRepos";
/// Key holding `"true"` / `"false"`: whether polling starts automatically.
pub const AUTO_REFRESH_KEY: &str = "autoRefreshEnabled";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("reading {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A string-keyed, string-valued persistent store.
pub trait KeyValueStore: Send + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Stores all keys in a single JSON object on disk.
///
/// A missing file reads as an empty store. A file that does not contain a
/// JSON object of strings also reads as empty, and is overwritten by the next
/// `set`.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!("storage: ignoring unreadable {}: {e}", self.path.display());
                Ok(BTreeMap::new())
            }
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut all = self.read_all()?;
        all.insert(key.to_owned(), value.to_owned());
        let encoded = serde_json::to_string_pretty(&all)?;

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        // Write-then-rename so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Non-persistent store for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any validation.
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.get(ADDED_REPOS_KEY).unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        let mut store = JsonFileStore::new(&path);
        store.set(AUTO_REFRESH_KEY, "true").unwrap();
        store.set(ADDED_REPOS_KEY, "[]").unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get(AUTO_REFRESH_KEY).unwrap().as_deref(), Some("true"));
        assert_eq!(reopened.get(ADDED_REPOS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn garbage_file_reads_as_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.get(AUTO_REFRESH_KEY).unwrap(), None);
        store.set(AUTO_REFRESH_KEY, "false").unwrap();
        assert_eq!(store.get(AUTO_REFRESH_KEY).unwrap().as_deref(), Some("false"));
    }
}
