use std::collections::BTreeMap;
use std::sync::RwLock;

use daf_types::StorageKind;

use crate::error::{StoreError, StoreResult};
use crate::traits::Storage;

/// In-memory, `BTreeMap`-based storage.
///
/// Intended for tests and embedding. Content is held behind a `RwLock`
/// and lives as long as the storage value; sessions that share one
/// `MemoryStorage` see each other's repositories.
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored locations.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move everything stored under `from/` to `to/`, as if the directory had
    /// been renamed. Returns the number of entries moved.
    pub fn rename_dir(&self, from: &str, to: &str) -> StoreResult<usize> {
        let from = format!("{}/", normalize(from));
        let to = normalize(to);
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let moved: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(&from))
            .cloned()
            .collect();
        for key in &moved {
            if let Some(data) = map.remove(key) {
                map.insert(format!("{to}/{}", &key[from.len()..]), data);
            }
        }
        Ok(moved.len())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(location: &str) -> String {
    location
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl Storage for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self
            .entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(map.get(&normalize(location)).cloned())
    }

    fn write(&self, location: &str, data: &[u8]) -> StoreResult<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        map.insert(normalize(location), data.to_vec());
        Ok(())
    }

    fn create(&self, location: &str, data: &[u8]) -> StoreResult<()> {
        let key = normalize(location);
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        if map.contains_key(&key) {
            return Err(StoreError::AlreadyExists(location.to_string()));
        }
        map.insert(key, data.to_vec());
        Ok(())
    }

    fn exists(&self, location: &str) -> StoreResult<bool> {
        let map = self
            .entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(map.contains_key(&normalize(location)))
    }

    fn remove(&self, location: &str) -> StoreResult<bool> {
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(map.remove(&normalize(location)).is_some())
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        let prefix = normalize(dir);
        let prefix = if prefix.is_empty() {
            prefix
        } else {
            format!("{prefix}/")
        };
        let map = self
            .entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(map
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entry_count", &self.len())
            .finish()
    }
}
