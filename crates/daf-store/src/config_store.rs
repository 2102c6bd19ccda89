//! Durable read/write of repository configuration records.
//!
//! [`ConfigStore`] keeps one YAML record per repository, at
//! `<root>/<config_file_name>`. The store picks the backend from the root's
//! [`StorageKind`], so POSIX and in-memory repositories can be mixed freely
//! in one session.
//!
//! Only creation is guarded ("create fails if present"); two processes
//! opening the same new output root at the same time must serialize
//! externally.

use std::sync::Arc;

use tracing::{debug, info};

use daf_types::{RepoRoot, StorageKind};

use crate::cfg::RepositoryCfg;
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStorage;
use crate::posix::PosixStorage;
use crate::traits::Storage;

/// File name of the configuration record inside a repository root.
pub const DEFAULT_CONFIG_FILE: &str = "repositoryCfg.yaml";

/// One backend per storage kind.
#[derive(Clone, Debug)]
pub struct StorageSet {
    posix: Arc<dyn Storage>,
    memory: Arc<dyn Storage>,
}

impl StorageSet {
    /// Local filesystem plus a fresh, private memory storage.
    pub fn new() -> Self {
        Self {
            posix: Arc::new(PosixStorage::new()),
            memory: Arc::new(MemoryStorage::new()),
        }
    }

    /// Use the given memory storage for `mem://` roots.
    pub fn with_memory(mut self, memory: Arc<dyn Storage>) -> Self {
        self.memory = memory;
        self
    }

    /// Use the given backend for plain-path and `file://` roots.
    pub fn with_posix(mut self, posix: Arc<dyn Storage>) -> Self {
        self.posix = posix;
        self
    }

    /// The backend serving `kind`.
    pub fn for_kind(&self, kind: StorageKind) -> &Arc<dyn Storage> {
        match kind {
            StorageKind::Posix => &self.posix,
            StorageKind::Memory => &self.memory,
        }
    }

    /// The backend serving `root`.
    pub fn for_root(&self, root: &RepoRoot) -> &Arc<dyn Storage> {
        self.for_kind(root.kind())
    }
}

impl Default for StorageSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and writes [`RepositoryCfg`] records at repository roots.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    storages: StorageSet,
    file_name: String,
}

impl ConfigStore {
    /// A store using [`DEFAULT_CONFIG_FILE`] as the record name.
    pub fn new(storages: StorageSet) -> Self {
        Self::with_file_name(storages, DEFAULT_CONFIG_FILE)
    }

    /// A store using a custom record name.
    pub fn with_file_name(storages: StorageSet, file_name: impl Into<String>) -> Self {
        Self {
            storages,
            file_name: file_name.into(),
        }
    }

    /// The backends this store writes through.
    pub fn storages(&self) -> &StorageSet {
        &self.storages
    }

    /// Location of the record for `root`.
    pub fn record_location(&self, root: &RepoRoot) -> String {
        root.join(&self.file_name)
    }

    /// Returns `true` if a record exists at `root`.
    pub fn exists(&self, root: &RepoRoot) -> StoreResult<bool> {
        self.storages
            .for_root(root)
            .exists(&self.record_location(root))
    }

    /// Load the record at `root`.
    ///
    /// The returned record's `root` is always `root`, whatever was stored,
    /// so a repository whose directory was moved loads from its new place.
    pub fn load(&self, root: &RepoRoot) -> StoreResult<Option<RepositoryCfg>> {
        let location = self.record_location(root);
        let Some(bytes) = self.storages.for_root(root).read(&location)? else {
            return Ok(None);
        };
        let mut cfg: RepositoryCfg = serde_yaml::from_slice(&bytes)?;

        let actual = root.to_string();
        if cfg.root != actual {
            debug!(stored = %cfg.root, actual = %actual, "repository root relocated");
            cfg.root = actual;
        }
        if cfg.storage != root.kind() {
            return Err(StoreError::InvalidRecord {
                path: location,
                reason: format!(
                    "record declares {} storage but was found in {} storage",
                    cfg.storage,
                    root.kind()
                ),
            });
        }
        Ok(Some(cfg))
    }

    /// Load the record at `root`, failing if there is none.
    pub fn load_required(&self, root: &RepoRoot) -> StoreResult<RepositoryCfg> {
        self.load(root)?
            .ok_or_else(|| StoreError::ConfigNotFound(root.to_string()))
    }

    /// Persist a new record at `root`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a record is already
    /// present; an existing record is never overwritten. The stored record's
    /// `root` and `storage` are set from `root`.
    pub fn create(&self, root: &RepoRoot, cfg: &RepositoryCfg) -> StoreResult<RepositoryCfg> {
        let mut cfg = cfg.clone();
        cfg.root = root.to_string();
        cfg.storage = root.kind();

        let yaml = serde_yaml::to_string(&cfg)?;
        let location = self.record_location(root);
        match self.storages.for_root(root).create(&location, yaml.as_bytes()) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                return Err(StoreError::AlreadyExists(root.to_string()))
            }
            Err(e) => return Err(e),
        }
        info!(root = %root, mapper = ?cfg.mapper, parents = cfg.parents.len(), "created repository configuration");
        Ok(cfg)
    }

    /// Append `parent` to the stored parents of `root` unless it is already
    /// recorded. Returns `true` if the record changed.
    ///
    /// Idempotent: repeating the call leaves a single entry.
    pub fn append_parent(&self, root: &RepoRoot, parent: &RepoRoot) -> StoreResult<bool> {
        let mut cfg = self.load_required(root)?;
        if cfg.has_parent(&parent.key()) {
            return Ok(false);
        }
        cfg.parents.push(parent.to_string());

        let yaml = serde_yaml::to_string(&cfg)?;
        self.storages
            .for_root(root)
            .write(&self.record_location(root), yaml.as_bytes())?;
        info!(root = %root, parent = %parent, "recorded new parent");
        Ok(true)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(StorageSet::new())
    }
}
