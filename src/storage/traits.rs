//! Snapshot store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{BatchrError, Result};

/// Keyed latest-value store for snapshots (target state, player state).
pub trait SnapshotStore<T>: Send + Sync {
    /// Latest value stored under `key`
    fn get(&self, key: &str) -> Result<Option<T>>;

    /// Replace the value stored under `key`
    fn put(&self, key: &str, value: &T) -> Result<()>;

    /// All stored keys, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// Snapshot store that lives only as long as the process
#[derive(Debug)]
pub struct MemorySnapshotStore<T> {
    values: RwLock<HashMap<String, T>>,
}

impl<T> MemorySnapshotStore<T> {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemorySnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> SnapshotStore<T> for MemorySnapshotStore<T> {
    fn get(&self, key: &str) -> Result<Option<T>> {
        let values = self.values.read().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &T) -> Result<()> {
        let mut values = self.values.write().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let values = self.values.read().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        let mut keys: Vec<String> = values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
