//! Enumerations of data IDs and references to single datasets.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use daf_types::DataId;

use crate::butler::{Butler, Dataset};
use crate::error::ButlerResult;

/// The data IDs of one dataset type at one level, each wrapped in a
/// [`DataRef`].
#[derive(Debug)]
pub struct ButlerSubset<'b> {
    dataset_type: String,
    level: Option<String>,
    refs: Vec<DataRef<'b>>,
}

impl<'b> ButlerSubset<'b> {
    pub(crate) fn collect(
        butler: &'b Butler,
        dataset_type: &str,
        level: Option<String>,
        data_id: &DataId,
    ) -> ButlerResult<Self> {
        let mut subset = Self {
            dataset_type: dataset_type.to_string(),
            level,
            refs: Vec::new(),
        };

        let tags = data_id.tags();
        let Some(all_keys) = butler.get_keys(dataset_type, None, tags)? else {
            return Ok(subset);
        };
        let ill_typed = data_id
            .iter()
            .any(|(k, v)| all_keys.get(k).is_some_and(|t| !t.accepts(v)));
        if ill_typed {
            debug!(dataset_type, data_id = %data_id, "ill-typed data ID, empty subset");
            return Ok(subset);
        }

        let Some(level_keys) = butler.get_keys(dataset_type, subset.level.as_deref(), tags)? else {
            return Ok(subset);
        };
        let format: Vec<&str> = level_keys.keys().map(String::as_str).collect();
        for tuple in butler.query_metadata(dataset_type, &format, data_id)? {
            let found: DataId = format.iter().copied().zip(tuple).collect();
            subset.refs.push(DataRef {
                butler,
                dataset_type: subset.dataset_type.clone(),
                data_id: data_id.merged(&found),
            });
        }
        debug!(dataset_type, level = ?subset.level, items = subset.refs.len(), "collected subset");
        Ok(subset)
    }

    pub fn dataset_type(&self) -> &str {
        &self.dataset_type
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataRef<'b>> {
        self.refs.iter()
    }
}

impl<'s, 'b> IntoIterator for &'s ButlerSubset<'b> {
    type Item = &'s DataRef<'b>;
    type IntoIter = std::slice::Iter<'s, DataRef<'b>>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.iter()
    }
}

impl<'b> IntoIterator for ButlerSubset<'b> {
    type Item = DataRef<'b>;
    type IntoIter = std::vec::IntoIter<DataRef<'b>>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.into_iter()
    }
}

/// A complete data ID bound to the session that produced it.
///
/// The reference is not tied to one dataset type: any dataset type sharing
/// the keys can be read or written through it.
#[derive(Clone)]
pub struct DataRef<'b> {
    butler: &'b Butler,
    dataset_type: String,
    data_id: DataId,
}

impl<'b> DataRef<'b> {
    pub fn data_id(&self) -> &DataId {
        &self.data_id
    }

    /// The dataset type of the subset this reference came from.
    pub fn dataset_type(&self) -> &str {
        &self.dataset_type
    }

    pub fn get(&self, dataset_type: &str) -> ButlerResult<Dataset> {
        self.butler.get(dataset_type, &self.data_id)
    }

    pub fn get_as<T: DeserializeOwned>(&self, dataset_type: &str) -> ButlerResult<T> {
        self.butler.get_as(dataset_type, &self.data_id)
    }

    pub fn put<T: Serialize + ?Sized>(&self, obj: &T, dataset_type: &str) -> ButlerResult<()> {
        self.butler.put(obj, dataset_type, &self.data_id)
    }

    pub fn dataset_exists(&self, dataset_type: &str) -> ButlerResult<bool> {
        self.butler.dataset_exists(dataset_type, &self.data_id)
    }

    /// The items of `dataset_type` at a finer `level` that share this
    /// reference's keys.
    pub fn sub_items(&self, dataset_type: &str, level: Option<&str>) -> ButlerResult<ButlerSubset<'b>> {
        self.butler.subset(dataset_type, level, &self.data_id)
    }
}

impl std::fmt::Debug for DataRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRef")
            .field("dataset_type", &self.dataset_type)
            .field("data_id", &self.data_id)
            .finish()
    }
}
