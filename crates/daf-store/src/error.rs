/// Errors from storage and configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Something is already stored at a location that must be fresh.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A repository root holds no configuration record.
    #[error("no repository configuration at {0}")]
    ConfigNotFound(String),

    /// A stored record names something this build cannot interpret.
    #[error("invalid record at {path}: {reason}")]
    InvalidRecord { path: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding shared storage state was poisoned.
    #[error("storage lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<serde_yaml::Error> for StoreError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
