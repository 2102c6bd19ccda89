//! The mapper contract consumed by the repository graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use daf_store::Storage;
use daf_types::{DataId, KeyType, KeyValue, RepoRoot};

use crate::error::MapperResult;
use crate::location::Location;

/// Distinct key tuples returned by a query, in deterministic order.
pub type KeyTuples = BTreeSet<Vec<KeyValue>>;

/// Key name to semantic type.
pub type KeyTypes = BTreeMap<String, KeyType>;

/// Translator from `(dataset type, data ID)` to physical locations.
///
/// Implementations must satisfy:
/// - `map` with `write == false` returns `Ok(None)` when the dataset does not
///   exist; with `write == true` it may return a location regardless.
/// - `query` returns an empty set for "no matches", never an error.
/// - Methods never mutate repository state.
pub trait Mapper: Send + Sync {
    /// Canonical name of this mapper's type.
    ///
    /// Two mappers denote the same type iff their type names are equal.
    fn type_name(&self) -> &str;

    /// Resolve the location of a dataset for reading or writing.
    fn map(&self, dataset_type: &str, data_id: &DataId, write: bool) -> MapperResult<Option<Location>>;

    /// Enumerate the values of `format` keys for every dataset matching the
    /// partial `data_id`.
    fn query(&self, dataset_type: &str, format: &[&str], data_id: &DataId) -> MapperResult<KeyTuples>;

    /// Key names and semantic types of a dataset type at `level` (all keys
    /// when `level` is `None`). `None` if the dataset type is unknown.
    fn keys(&self, dataset_type: &str, level: Option<&str>) -> MapperResult<Option<KeyTypes>>;

    /// Enumeration granularity used by subsets when no level is given.
    fn default_level(&self) -> Option<String>;

    /// Optionally hand back an already materialized dataset instead of
    /// going through generic decoding of the stored bytes.
    fn bypass(
        &self,
        _dataset_type: &str,
        _location: &Location,
        _data_id: &DataId,
    ) -> Option<MapperResult<Value>> {
        None
    }
}

impl fmt::Debug for dyn Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapper({})", self.type_name())
    }
}

/// Everything a mapper constructor receives.
#[derive(Clone, Debug)]
pub struct MapperInit {
    /// The repository the mapper serves.
    pub root: RepoRoot,
    /// Opaque constructor arguments from the repository configuration.
    pub args: Option<Value>,
    /// Backend holding the repository's datasets.
    pub storage: Arc<dyn Storage>,
}

/// A mapper type that can be named and constructed through a registry.
pub trait MapperKind: Mapper + Sized + 'static {
    /// Canonical type name, persisted in repository configurations.
    const TYPE_NAME: &'static str;

    /// Build an instance for one repository.
    fn construct(init: &MapperInit) -> MapperResult<Self>;
}
