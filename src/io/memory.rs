//! In-memory cursor storage.

use crate::error::StateStoreError;
use crate::incremental::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A [`StateStore`] backed by a shared `HashMap`.
///
/// Clones share the same map, so a test can hand one clone to a pipeline and
/// inspect the cursor through another. Nothing survives the process.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStateStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing cursors.
    pub fn with_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(Mutex::new(map)),
        }
    }

    /// Copy of every stored entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> Result<String, StateStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StateStoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
