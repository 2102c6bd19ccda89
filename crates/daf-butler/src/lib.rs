//! Session facade for DAF, the federated data-access layer.
//!
//! A [`Butler`] binds ordered input repositories (read sources) and output
//! repositories (write targets) for one session. Clients name datasets by a
//! dataset type plus a [`DataId`]; where and how the bytes live is left to
//! each repository's mapper.
//!
//! ```no_run
//! use daf_butler::{Butler, ButlerContext, DataId, Mode, RepositoryArgs};
//!
//! # fn main() -> Result<(), daf_butler::ButlerError> {
//! let ctx = ButlerContext::default();
//! let butler = Butler::builder(&ctx)
//!     .input(RepositoryArgs::new("/data/calib").tags("calib"))
//!     .output(RepositoryArgs::new("/data/rerun").mode(Mode::ReadWrite).mapper("FileMapper"))
//!     .build()?;
//!
//! let id = DataId::new().with("visit", 2).with("filter", "g");
//! butler.put(&serde_json::json!({ "zeropoint": 27.1 }), "photoCalib", &id)?;
//! let calib = butler.get("photoCalib", &id)?;
//! # let _ = calib;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`context`]: [`ButlerContext`] with the registry, storage backends and settings
//! - [`settings`]: [`ButlerSettings`], loadable from TOML
//! - [`butler`]: [`Butler`] with get, put, query and subset
//! - [`subset`]: [`ButlerSubset`] and [`DataRef`]
//! - [`codec`]: Dataset encodings

pub mod butler;
pub mod codec;
pub mod context;
pub mod error;
pub mod settings;
pub mod subset;

pub use butler::{Butler, ButlerBuilder, Dataset};
pub use context::ButlerContext;
pub use error::{ButlerError, ButlerResult};
pub use settings::ButlerSettings;
pub use subset::{ButlerSubset, DataRef};

pub use daf_graph::{GraphError, RepositoryArgs, RepositoryGraph, RepositoryNode};
pub use daf_mapper::{
    DatasetSpec, FileMapper, FileMapperArgs, Format, KeyTypes, Mapper, MapperId, MapperKind, MapperRegistry,
};
pub use daf_store::{MemoryStorage, StorageSet, StoreError};
pub use daf_types::{DataId, KeyType, KeyValue, Mode, TagSet};
