//! Foundation types for DAF, the federated data-access layer.
//!
//! This crate provides the small value types shared by every other DAF
//! crate. Every other DAF crate depends on `daf-types`.
//!
//! # Key Types
//!
//! - [`DataId`]: Key/value mapping identifying one dataset instance, optionally tag-scoped
//! - [`KeyValue`] / [`KeyType`]: Data ID values and their declared semantic types
//! - [`TagSet`]: Session-scoped repository labels
//! - [`RepoRoot`] / [`RootKey`]: Repository locations and their canonical identity
//! - [`StorageKind`]: Which storage backend a root lives in
//! - [`Mode`]: Read/write access mode of a repository within a session

pub mod data_id;
pub mod error;
pub mod key;
pub mod mode;
pub mod root;
pub mod tags;

pub use data_id::DataId;
pub use error::TypeError;
pub use key::{KeyType, KeyValue};
pub use mode::Mode;
pub use root::{RepoRoot, RootKey, StorageKind};
pub use tags::TagSet;
