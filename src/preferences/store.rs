//! Key/value persistence behind the preferences facade.

use super::PreferenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i32),
    Str(String),
}

impl std::fmt::Display for PrefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{b}"),
            PrefValue::Int(i) => write!(f, "{i}"),
            PrefValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Flat key/value storage. Writes are committed before `put` returns.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn put(&self, key: &str, value: PrefValue) -> Result<(), PreferenceError>;

    /// All stored entries, sorted by key.
    fn entries(&self) -> Vec<(String, PrefValue)>;
}

/// Shared handle to a store.
pub type SharedPreferenceStore = Arc<dyn PreferenceStore>;

fn lock(map: &Mutex<BTreeMap<String, PrefValue>>) -> MutexGuard<'_, BTreeMap<String, PrefValue>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-persistent store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, PrefValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared() -> SharedPreferenceStore {
        Arc::new(Self::new())
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: PrefValue) -> Result<(), PreferenceError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn entries(&self) -> Vec<(String, PrefValue)> {
        lock(&self.values)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Store backed by a pretty-printed JSON object on disk.
///
/// The whole file is rewritten on every `put`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, PrefValue>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreferenceError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| PreferenceError::Io(e.to_string()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| PreferenceError::Parse(e.to_string()))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, values: &BTreeMap<String, PrefValue>) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PreferenceError::Io(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| PreferenceError::Parse(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| PreferenceError::Io(e.to_string()))
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        lock(&self.values).get(key).cloned()
    }

    /// The in-memory map only changes once the file write succeeds.
    fn put(&self, key: &str, value: PrefValue) -> Result<(), PreferenceError> {
        let mut values = lock(&self.values);
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        self.commit(&next)?;
        *values = next;
        Ok(())
    }

    fn entries(&self) -> Vec<(String, PrefValue)> {
        lock(&self.values)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
