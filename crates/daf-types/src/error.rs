use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository root: {0}")]
    InvalidRoot(String),

    #[error("unsupported root scheme `{scheme}` in {root}")]
    UnsupportedScheme { scheme: String, root: String },

    #[error("invalid mode `{0}`: expected one of r, w, rw")]
    InvalidMode(String),

    #[error("invalid key type `{0}`: expected int or str")]
    InvalidKeyType(String),
}
