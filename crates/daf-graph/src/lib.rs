//! Repository graph for DAF sessions.
//!
//! A session reads from ordered inputs and writes to ordered outputs. Each
//! repository may name parents in its stored configuration, so the set of
//! repositories actually searched is a DAG discovered at open time. This
//! crate turns the session's [`RepositoryArgs`] into a [`RepositoryGraph`]:
//! configurations loaded or created, mappers resolved and instantiated,
//! parents expanded, duplicates removed and a deterministic search order
//! computed.
//!
//! # Key Types
//!
//! - [`RepositoryArgs`]: How one repository is opened (root, mode, mapper, tags)
//! - [`GraphBuilder`] / [`BuildOptions`]: Two-phase construction
//! - [`RepositoryGraph`]: Arena of configurations and live nodes plus the search order
//! - [`RepositoryNode`]: A repository bound to its mapper and storage backend

pub mod args;
pub mod error;
pub mod graph;
pub mod node;

pub use args::RepositoryArgs;
pub use error::{GraphError, GraphResult};
pub use graph::{BuildOptions, GraphBuilder, RepositoryGraph};
pub use node::{NodeId, RepositoryNode};
