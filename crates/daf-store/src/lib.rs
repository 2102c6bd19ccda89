//! Storage backends and durable repository configuration for DAF.
//!
//! A repository is one location holding a persisted configuration record
//! plus its datasets. This crate provides the byte-level backends that
//! locations resolve to, and the [`ConfigStore`] that reads and writes the
//! configuration record at a repository root.
//!
//! # Storage Backends
//!
//! All backends implement the [`Storage`] trait:
//!
//! - [`PosixStorage`] -- files on the local filesystem
//! - [`MemoryStorage`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A configuration record is created once per repository; creating it
//!    again is an error, never a silent overwrite.
//! 2. The `root` field of a record is never trusted: it is rewritten to the
//!    location the record was loaded from, so a moved repository still loads.
//! 3. A record's parents only grow, by appending roots not already present.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod cfg;
pub mod config_store;
pub mod error;
pub mod memory;
pub mod posix;
pub mod traits;

pub use cfg::RepositoryCfg;
pub use config_store::{ConfigStore, StorageSet, DEFAULT_CONFIG_FILE};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStorage;
pub use posix::PosixStorage;
pub use traits::Storage;
