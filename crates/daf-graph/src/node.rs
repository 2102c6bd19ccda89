//! Live repository handles.

use std::fmt;
use std::sync::Arc;

use daf_mapper::{Location, Mapper};
use daf_store::{Storage, StoreResult};
use daf_types::{Mode, RepoRoot, RootKey, TagSet};

/// Index of a repository in its graph's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A repository opened for one session: its configuration (held in the
/// owning graph's arena under the same [`NodeId`]), its mapper, its storage
/// backend and the tags the session gave it.
pub struct RepositoryNode {
    pub(crate) id: NodeId,
    pub(crate) root: RepoRoot,
    pub(crate) key: RootKey,
    pub(crate) mapper: Option<Arc<dyn Mapper>>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) tags: TagSet,
    pub(crate) mode: Mode,
}

impl RepositoryNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn root(&self) -> &RepoRoot {
        &self.root
    }

    /// Canonical identity of the root.
    pub fn key(&self) -> &RootKey {
        &self.key
    }

    /// The mapper, or `None` if the repository's mapper is undetermined.
    pub fn mapper(&self) -> Option<&Arc<dyn Mapper>> {
        self.mapper.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns `true` if this node takes part in a query for `requested`.
    pub fn admits(&self, requested: &TagSet) -> bool {
        self.tags.admits(requested)
    }

    /// Read the primary bytes of a mapped location.
    pub fn read(&self, location: &Location) -> StoreResult<Option<Vec<u8>>> {
        self.storage.read(location.primary())
    }
}

impl fmt::Debug for RepositoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryNode")
            .field("id", &self.id)
            .field("root", &self.root.to_string())
            .field("mapper", &self.mapper.as_ref().map(|m| m.type_name().to_string()))
            .field("tags", &self.tags)
            .field("mode", &self.mode)
            .finish()
    }
}
