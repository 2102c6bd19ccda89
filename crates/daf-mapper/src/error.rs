//! Error types for mapper operations.

use daf_store::StoreError;

/// Errors that can occur while naming, building or calling a mapper.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// A mapper name that the registry cannot resolve to a type.
    #[error("unknown mapper: {0}")]
    UnknownMapper(String),

    /// Two or more candidate mappers disagree and none was chosen explicitly.
    #[error("ambiguous mapper: candidates {0:?}")]
    Ambiguous(Vec<String>),

    /// Mapper constructor arguments could not be interpreted.
    #[error("invalid arguments for {mapper}: {reason}")]
    InvalidArgs {
        /// The mapper type being constructed.
        mapper: String,
        /// What was wrong.
        reason: String,
    },

    /// A data ID lacks a key the dataset's location depends on.
    #[error("data ID for {dataset_type} is missing key `{key}`")]
    MissingKey {
        /// The dataset type being mapped.
        dataset_type: String,
        /// The missing key.
        key: String,
    },

    /// A data ID key or value cannot be placed in a path.
    #[error("{dataset_type}: `{key}` = {value:?} cannot appear in a dataset path")]
    InvalidValue {
        /// The dataset type being mapped.
        dataset_type: String,
        /// The offending key.
        key: String,
        /// The offending text.
        value: String,
    },

    /// A requested key is not part of the dataset type.
    #[error("dataset type {dataset_type} has no key `{key}`")]
    UnknownKey {
        /// The dataset type being queried.
        dataset_type: String,
        /// The unknown key.
        key: String,
    },

    /// A path template could not be compiled.
    #[error("invalid template `{template}`: {reason}")]
    Template {
        /// The offending template.
        template: String,
        /// What was wrong.
        reason: String,
    },

    /// Storage error while checking or listing locations.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for mapper results.
pub type MapperResult<T> = Result<T, MapperError>;
