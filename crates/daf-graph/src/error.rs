//! Error types for repository graph construction.

use daf_mapper::MapperError;
use daf_store::StoreError;
use daf_types::TypeError;

/// Errors that abort building a [`RepositoryGraph`](crate::RepositoryGraph).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A repository argument is unusable as given.
    #[error("invalid repository arguments: {0}")]
    InvalidArgs(String),

    /// A root string could not be parsed.
    #[error("invalid root: {0}")]
    InvalidRoot(#[from] TypeError),

    /// An input or parent root holds no configuration and none can be
    /// synthesized for it.
    #[error("no repository configuration at {0}")]
    ConfigNotFound(String),

    /// An explicit override disagrees with the stored configuration.
    #[error("configuration mismatch at {root}: stored {field} is {stored}, requested {requested}")]
    ConfigMismatch {
        /// The repository whose record conflicts.
        root: String,
        /// The conflicting record field.
        field: &'static str,
        /// Value held by the stored record.
        stored: String,
        /// Value requested for this session.
        requested: String,
    },

    /// The repositories feeding a new output disagree on the mapper type and
    /// no mapper was given explicitly.
    #[error("cannot infer mapper for {root}: candidates {candidates:?}")]
    AmbiguousMapper {
        /// The output being created.
        root: String,
        /// Distinct canonical mapper names, sorted.
        candidates: Vec<String>,
    },

    /// A parent chain leads back to a repository that is being expanded.
    #[error("parent cycle detected: {}", chain.join(" -> "))]
    CycleDetected {
        /// Roots along the cycle, starting and ending at the same root.
        chain: Vec<String>,
    },

    /// Mapper resolution or construction failed.
    #[error("mapper error: {0}")]
    Mapper(#[from] MapperError),

    /// Configuration storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
