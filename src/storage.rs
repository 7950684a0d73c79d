use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Typed key-value storage backed by a single JSON file.
///
/// Mutations are in-memory until `flush()` rewrites the whole file.
/// Single-process access is assumed; concurrent writers would clobber
/// each other (read-then-overwrite, no locking).
pub struct KeyValueStorage {
    path: PathBuf,
    map: HashMap<String, Value>,
}

impl KeyValueStorage {
    /// Opens the storage file. A missing or corrupt file yields empty
    /// storage rather than an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let map = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt storage file, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, map }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.map.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.map.insert(key.to_string(), v);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize storage value");
            }
        }
    }

    /// Writes the full map back to disk, overwriting prior content.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Creating storage directory")?;
        }
        let json = serde_json::to_vec_pretty(&self.map)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write storage file {}", self.path.display()))?;
        Ok(())
    }
}
