// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persisted record of the labels the reconciler has applied.
//!
//! The applied-label set is how the reconciler knows which labels to remove
//! when the user drops them from configuration. It is updated one key at a
//! time as each kubectl operation succeeds, and written through a
//! [`StateStore`] immediately, so an interrupted pass leaves an accurate
//! partial record rather than a rolled-back one.
//!
//! On disk the state is a small JSON document:
//!
//! ```json
//! {
//!   "current_labels": { "disktype": "ssd" },
//!   "updated_at": "2025-01-01T00:00:00Z"
//! }
//! ```

use crate::label_errors::StateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Labels previously set on the node by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliedLabels(BTreeMap<String, String>);

impl AppliedLabels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Forgets `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in order, cloned so the set can be mutated while walking them.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for AppliedLabels {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AppliedLabels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Repository for the applied-label state.
///
/// `load` runs once when a pass starts; `save` runs after every successful
/// label mutation.
pub trait StateStore: Send + Sync {
    /// Loads the applied labels, returning an empty set on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if existing state cannot be read or decoded.
    fn load(&self) -> Result<AppliedLabels, StateError>;

    /// Persists the applied labels, replacing what was stored.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the state cannot be written.
    fn save(&self, labels: &AppliedLabels) -> Result<(), StateError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    current_labels: AppliedLabels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// JSON file-backed state store.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// state file, so readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<AppliedLabels, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No label state yet, starting empty");
                return Ok(AppliedLabels::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let document: StateDocument =
            serde_json::from_str(&raw).map_err(|source| StateError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(document.current_labels)
    }

    fn save(&self, labels: &AppliedLabels) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let document = StateDocument {
            current_labels: labels.clone(),
            updated_at: Some(Utc::now()),
        };
        let json = serde_json::to_string_pretty(&document).map_err(|source| {
            StateError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), labels = labels.len(), "Persisted label state");
        Ok(())
    }
}

/// In-memory state store.
///
/// Counts saves so callers can observe that state is persisted per operation.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    labels: Mutex<AppliedLabels>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new(initial: AppliedLabels) -> Self {
        Self {
            labels: Mutex::new(initial),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The most recently saved labels.
    #[must_use]
    pub fn snapshot(&self) -> AppliedLabels {
        self.labels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<AppliedLabels, StateError> {
        Ok(self.snapshot())
    }

    fn save(&self, labels: &AppliedLabels) -> Result<(), StateError> {
        *self
            .labels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = labels.clone();
        *self.saves.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
