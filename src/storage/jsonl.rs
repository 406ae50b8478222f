//! JSONL-backed snapshot store with in-memory caching.
//!
//! Every `put` appends one line; on open the file is replayed and the last line
//! per key wins. `compact` rewrites the file down to one line per key.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::traits::SnapshotStore;
use crate::error::{BatchrError, Result};
use crate::id::now_ms;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotLine {
    key: String,
    stored_at: u64,
    value: serde_json::Value,
}

/// Snapshot store persisted to `<base>/<collection>.jsonl`
#[derive(Debug)]
pub struct JsonlSnapshotStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, serde_json::Value>>,
}

impl JsonlSnapshotStore {
    /// Open (or create) the `collection` file under `base_path`
    pub fn open(base_path: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path)?;
        let path = base_path.join(format!("{}.jsonl", collection));
        let cache = load(&path)?;
        log::debug!("Loaded {} snapshots from {}", cache.len(), path.display());
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file with only the latest value per key
    pub fn compact(&self) -> Result<()> {
        let cache = self.cache.read().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        let mut keys: Vec<&String> = cache.keys().collect();
        keys.sort();

        let mut file = File::create(&self.path)?;
        let stored_at = now_ms();
        for key in keys {
            let line = SnapshotLine {
                key: key.clone(),
                stored_at,
                value: cache[key].clone(),
            };
            writeln!(file, "{}", serde_json::to_string(&line)?)?;
        }
        Ok(())
    }

    fn append(&self, line: &SnapshotLine) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(line)?)?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<HashMap<String, serde_json::Value>> {
    let mut cache = HashMap::new();
    if !path.exists() {
        return Ok(cache);
    }

    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SnapshotLine = serde_json::from_str(&line)?;
        cache.insert(record.key, record.value);
    }
    Ok(cache)
}

impl<T: Serialize + DeserializeOwned> SnapshotStore<T> for JsonlSnapshotStore {
    fn get(&self, key: &str) -> Result<Option<T>> {
        let cache = self.cache.read().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        match cache.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &T) -> Result<()> {
        let line = SnapshotLine {
            key: key.to_string(),
            stored_at: now_ms(),
            value: serde_json::to_value(value)?,
        };

        // File first, then cache
        self.append(&line)?;

        let mut cache = self.cache.write().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        cache.insert(line.key, line.value);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let cache = self.cache.read().map_err(|e| BatchrError::InvalidState(e.to_string()))?;
        let mut keys: Vec<String> = cache.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
