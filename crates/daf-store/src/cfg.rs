//! The persisted repository configuration record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use daf_types::{RepoRoot, RootKey, StorageKind, TypeError};

/// Description of one repository, persisted at its root.
///
/// Once written, `mapper`, `mapper_args` and `storage` never change. `root`
/// is rewritten on every load to the location the record was found at, and
/// `parents` only grows by appending roots not already present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCfg {
    /// Location of the repository.
    pub root: String,
    /// Canonical name of the mapper type, if one has been determined.
    #[serde(default)]
    pub mapper: Option<String>,
    /// Opaque constructor arguments for the mapper.
    #[serde(default)]
    pub mapper_args: Option<Value>,
    /// Backend that holds this record.
    #[serde(default)]
    pub storage: StorageKind,
    /// Parent repository roots, in search order.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RepositoryCfg {
    /// A record for `root` with no mapper and no parents.
    pub fn new(root: &RepoRoot) -> Self {
        Self {
            root: root.to_string(),
            mapper: None,
            mapper_args: None,
            storage: root.kind(),
            parents: Vec::new(),
        }
    }

    /// Builder-style mapper name.
    pub fn with_mapper(mut self, mapper: impl Into<String>) -> Self {
        self.mapper = Some(mapper.into());
        self
    }

    /// Builder-style mapper arguments.
    pub fn with_mapper_args(mut self, args: Value) -> Self {
        self.mapper_args = Some(args);
        self
    }

    /// Builder-style parent list.
    pub fn with_parents<S: ToString>(mut self, parents: impl IntoIterator<Item = S>) -> Self {
        self.parents = parents.into_iter().map(|p| p.to_string()).collect();
        self
    }

    /// The parsed root.
    pub fn repo_root(&self) -> Result<RepoRoot, TypeError> {
        RepoRoot::parse(&self.root)
    }

    /// The parsed parent roots, in stored order.
    pub fn parent_roots(&self) -> Result<Vec<RepoRoot>, TypeError> {
        self.parents.iter().map(|p| RepoRoot::parse(p)).collect()
    }

    /// Returns `true` if `parent` is already recorded, comparing canonical
    /// root identity rather than spelling.
    pub fn has_parent(&self, parent: &RootKey) -> bool {
        self.parents
            .iter()
            .filter_map(|p| RepoRoot::parse(p).ok())
            .any(|p| &p.key() == parent)
    }
}
