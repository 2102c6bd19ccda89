//! Mappers: pluggable translators from `(dataset type, data ID)` to a
//! physical location and back.
//!
//! The repository graph never interprets dataset keys itself. It asks each
//! repository's [`Mapper`] to resolve locations, enumerate key tuples and
//! describe key types, through the fixed contract in [`mapper`].
//!
//! # Modules
//!
//! - [`mapper`]: The [`Mapper`] trait and construction context
//! - [`location`]: [`Location`] and dataset [`Format`]
//! - [`id`]: [`MapperId`]: a mapper named by type, instance, or name
//! - [`registry`]: [`MapperRegistry`], the injected name-to-type capability
//! - [`resolve`]: [`MapperResolver`], inference of a shared mapper
//! - [`file_mapper`]: [`FileMapper`], a template-driven mapper

pub mod error;
pub mod file_mapper;
pub mod id;
pub mod location;
pub mod mapper;
pub mod registry;
pub mod resolve;

pub use error::{MapperError, MapperResult};
pub use file_mapper::{DatasetSpec, FileMapper, FileMapperArgs};
pub use id::{MapperId, MapperType};
pub use location::{Format, Location};
pub use mapper::{KeyTuples, KeyTypes, Mapper, MapperInit, MapperKind};
pub use registry::MapperRegistry;
pub use resolve::MapperResolver;
