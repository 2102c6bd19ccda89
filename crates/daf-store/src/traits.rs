use std::fmt::Debug;

use daf_types::StorageKind;

use crate::error::StoreResult;

/// Byte-level storage backend.
///
/// Locations are the full strings produced by
/// [`RepoRoot::join`](daf_types::RepoRoot::join). All implementations must
/// satisfy these invariants:
/// - `read` of a missing location is `Ok(None)`, not an error.
/// - `create` never overwrites: it fails with
///   [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) when the
///   location is occupied.
/// - `write` replaces the whole content of a location.
/// - All I/O errors are propagated, never silently ignored.
pub trait Storage: Send + Sync + Debug {
    /// Which kind of root this backend serves.
    fn kind(&self) -> StorageKind;

    /// Read the bytes at `location`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `data` at `location`, replacing any previous content.
    fn write(&self, location: &str, data: &[u8]) -> StoreResult<()>;

    /// Write `data` at `location` only if nothing is stored there yet.
    fn create(&self, location: &str, data: &[u8]) -> StoreResult<()>;

    /// Check whether anything is stored at `location`.
    fn exists(&self, location: &str) -> StoreResult<bool>;

    /// Remove the content at `location`. Returns `true` if it existed.
    fn remove(&self, location: &str) -> StoreResult<bool>;

    /// List every stored location below `dir`, as `/`-separated paths
    /// relative to `dir`, in sorted order. A missing `dir` lists as empty.
    fn list(&self, dir: &str) -> StoreResult<Vec<String>>;
}
