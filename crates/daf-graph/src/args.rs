//! Per-session repository arguments.

use serde_json::Value;

use daf_mapper::MapperId;
use daf_store::RepositoryCfg;
use daf_types::{Mode, RepoRoot, TagSet};

use crate::error::{GraphError, GraphResult};

/// How one input or output repository is opened for a session.
///
/// Only the root (or an already loaded configuration) is required. The mode
/// defaults by role: read-only for inputs, write-only for outputs. Tags are
/// a session overlay and are never persisted.
#[derive(Clone, Debug, Default)]
pub struct RepositoryArgs {
    /// Root location string.
    pub root: Option<String>,
    /// An already loaded configuration standing in for the stored record.
    pub cfg: Option<RepositoryCfg>,
    /// Access mode; `None` picks the role default.
    pub mode: Option<Mode>,
    /// Mapper override.
    pub mapper: Option<MapperId>,
    /// Mapper constructor arguments override.
    pub mapper_args: Option<Value>,
    /// Session tags.
    pub tags: TagSet,
}

impl RepositoryArgs {
    /// Arguments for the repository at `root`.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Arguments taking their root and record from a loaded configuration.
    pub fn from_cfg(cfg: RepositoryCfg) -> Self {
        Self {
            cfg: Some(cfg),
            ..Self::default()
        }
    }

    /// Builder-style mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Builder-style mapper override.
    pub fn mapper(mut self, mapper: impl Into<MapperId>) -> Self {
        self.mapper = Some(mapper.into());
        self
    }

    /// Builder-style mapper arguments.
    pub fn mapper_args(mut self, args: Value) -> Self {
        self.mapper_args = Some(args);
        self
    }

    /// Builder-style tags, added to any already present.
    pub fn tags(mut self, tags: impl Into<TagSet>) -> Self {
        self.tags.union_with(&tags.into());
        self
    }

    /// The root these arguments name.
    pub(crate) fn repo_root(&self) -> GraphResult<RepoRoot> {
        let raw = match (&self.root, &self.cfg) {
            (Some(root), _) => root.as_str(),
            (None, Some(cfg)) => cfg.root.as_str(),
            (None, None) => {
                return Err(GraphError::InvalidArgs(
                    "repository arguments need a root or a configuration".into(),
                ))
            }
        };
        Ok(RepoRoot::parse(raw)?)
    }
}

impl From<&str> for RepositoryArgs {
    fn from(root: &str) -> Self {
        Self::new(root)
    }
}

impl From<String> for RepositoryArgs {
    fn from(root: String) -> Self {
        Self::new(root)
    }
}

impl From<&RepoRoot> for RepositoryArgs {
    fn from(root: &RepoRoot) -> Self {
        Self::new(root.to_string())
    }
}

impl From<RepositoryCfg> for RepositoryArgs {
    fn from(cfg: RepositoryCfg) -> Self {
        Self::from_cfg(cfg)
    }
}
