//! Local repository registry.
//!
//! The persisted list under [`ADDED_REPOS_KEY`] is the source of truth: every
//! call reads it, and every mutation writes the full list back.

use thiserror::Error;

use crate::storage::{ADDED_REPOS_KEY, AUTO_REFRESH_KEY, KeyValueStore, StorageError};
use crate::types::TrackedRepository;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("This repository has already been added: {full_name}")]
    Duplicate { full_name: String },
    #[error("invalid repository {input:?}: expected owner/name")]
    InvalidName { input: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reject empty parts and embedded slashes.
pub fn validate_name(owner: &str, name: &str) -> Result<(), RegistryError> {
    let bad = |s: &str| s.trim().is_empty() || s.contains('/');
    if bad(owner) || bad(name) {
        return Err(RegistryError::InvalidName {
            input: format!("{owner}/{name}"),
        });
    }
    Ok(())
}

pub struct Registry {
    store: Box<dyn KeyValueStore>,
}

impl Registry {
    pub fn new(store: impl KeyValueStore) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Tracked repositories in insertion order.
    ///
    /// Malformed persisted data (not a list, or an entry without `owner` /
    /// `name`) yields an empty list. Duplicate entries are collapsed, keeping
    /// the first.
    pub fn list(&self) -> Result<Vec<TrackedRepository>, StorageError> {
        let Some(raw) = self.store.get(ADDED_REPOS_KEY)? else {
            return Ok(Vec::new());
        };
        let parsed: Vec<TrackedRepository> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("registry: discarding malformed {ADDED_REPOS_KEY}: {e}");
                return Ok(Vec::new());
            }
        };
        if parsed
            .iter()
            .any(|r| r.owner.trim().is_empty() || r.name.trim().is_empty())
        {
            tracing::warn!("registry: discarding {ADDED_REPOS_KEY} with incomplete entries");
            return Ok(Vec::new());
        }

        let mut repos: Vec<TrackedRepository> = Vec::with_capacity(parsed.len());
        for mut repo in parsed {
            if repos.iter().any(|r| r.matches(&repo.owner, &repo.name)) {
                continue;
            }
            if repo.full_name.is_empty() {
                repo.full_name = format!("{}/{}", repo.owner, repo.name);
            }
            repos.push(repo);
        }
        Ok(repos)
    }

    pub fn contains(&self, owner: &str, name: &str) -> Result<bool, StorageError> {
        Ok(self.list()?.iter().any(|r| r.matches(owner, name)))
    }

    /// Append `(owner, name)`; fails with `Duplicate` when already tracked
    /// under any casing.
    pub fn add(&mut self, owner: &str, name: &str) -> Result<TrackedRepository, RegistryError> {
        let (owner, name) = (owner.trim(), name.trim());
        validate_name(owner, name)?;

        let mut repos = self.list()?;
        if let Some(existing) = repos.iter().find(|r| r.matches(owner, name)) {
            return Err(RegistryError::Duplicate {
                full_name: existing.full_name.clone(),
            });
        }

        let repo = TrackedRepository::new(owner, name);
        repos.push(repo.clone());
        self.persist(&repos)?;
        tracing::debug!("registry: added {}", repo.full_name);
        Ok(repo)
    }

    /// Remove `(owner, name)` if present. Returns the removed entry, `None`
    /// when nothing matched (not an error).
    pub fn remove(
        &mut self,
        owner: &str,
        name: &str,
    ) -> Result<Option<TrackedRepository>, StorageError> {
        let mut repos = self.list()?;
        let Some(idx) = repos.iter().position(|r| r.matches(owner, name)) else {
            return Ok(None);
        };
        let removed = repos.remove(idx);
        self.persist(&repos)?;
        tracing::debug!("registry: removed {}", removed.full_name);
        Ok(Some(removed))
    }

    pub fn auto_refresh_enabled(&self) -> Result<bool, StorageError> {
        Ok(self.store.get(AUTO_REFRESH_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) -> Result<(), StorageError> {
        self.store
            .set(AUTO_REFRESH_KEY, if enabled { "true" } else { "false" })
    }

    fn persist(&mut self, repos: &[TrackedRepository]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(repos)?;
        self.store.set(ADDED_REPOS_KEY, &encoded)
    }
}
