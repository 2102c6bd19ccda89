//! The session facade.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use daf_graph::{GraphBuilder, RepositoryArgs, RepositoryGraph, RepositoryNode};
use daf_mapper::{KeyTypes, Location, Mapper};
use daf_types::{DataId, KeyValue, TagSet};

use crate::codec;
use crate::context::ButlerContext;
use crate::error::{ButlerError, ButlerResult};
use crate::subset::ButlerSubset;

/// A dataset as it crosses the facade when no concrete type is requested.
pub type Dataset = Value;

/// One open binding of input and output repositories.
///
/// Reads walk the inputs in search order and stop at the first repository
/// holding the dataset. Writes go to every output.
#[derive(Debug)]
pub struct Butler {
    graph: RepositoryGraph,
}

/// Collects the inputs and outputs of a [`Butler`].
pub struct ButlerBuilder<'c> {
    ctx: &'c ButlerContext,
    inputs: Vec<RepositoryArgs>,
    outputs: Vec<RepositoryArgs>,
}

impl<'c> ButlerBuilder<'c> {
    pub fn input(mut self, args: impl Into<RepositoryArgs>) -> Self {
        self.inputs.push(args.into());
        self
    }

    pub fn inputs<A: Into<RepositoryArgs>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.inputs.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, args: impl Into<RepositoryArgs>) -> Self {
        self.outputs.push(args.into());
        self
    }

    pub fn outputs<A: Into<RepositoryArgs>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.outputs.extend(args.into_iter().map(Into::into));
        self
    }

    /// Open the session. No partially usable butler is ever returned.
    pub fn build(self) -> ButlerResult<Butler> {
        let graph = GraphBuilder::new(self.ctx.store(), self.ctx.registry())
            .options(self.ctx.settings().build_options())
            .inputs(self.inputs)
            .outputs(self.outputs)
            .build()?;
        Ok(Butler { graph })
    }
}

impl Butler {
    pub fn builder(ctx: &ButlerContext) -> ButlerBuilder<'_> {
        ButlerBuilder {
            ctx,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Open a session from ordered inputs and outputs.
    pub fn open<I, O>(ctx: &ButlerContext, inputs: I, outputs: O) -> ButlerResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<RepositoryArgs>,
        O: IntoIterator,
        O::Item: Into<RepositoryArgs>,
    {
        Self::builder(ctx).inputs(inputs).outputs(outputs).build()
    }

    pub fn graph(&self) -> &RepositoryGraph {
        &self.graph
    }

    /// Searched repositories, in search order.
    pub fn inputs(&self) -> impl Iterator<Item = &RepositoryNode> {
        self.graph.inputs()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &RepositoryNode> {
        self.graph.outputs()
    }

    // ---- Reads ----

    /// Read a dataset as a dynamic value.
    pub fn get(&self, dataset_type: &str, data_id: &DataId) -> ButlerResult<Dataset> {
        self.get_as(dataset_type, data_id)
    }

    /// Read a dataset as a `T`, from the first searched repository that
    /// holds it.
    pub fn get_as<T: DeserializeOwned>(&self, dataset_type: &str, data_id: &DataId) -> ButlerResult<T> {
        let not_found = || ButlerError::NotFound {
            dataset_type: dataset_type.to_string(),
            data_id: data_id.to_string(),
        };
        let (node, mapper, location) = self.locate(dataset_type, data_id)?.ok_or_else(not_found)?;

        if let Some(bypassed) = mapper.bypass(dataset_type, &location, data_id) {
            debug!(root = %node.root(), dataset_type, "dataset supplied by mapper bypass");
            let value = bypassed?;
            return serde_json::from_value(value).map_err(|e| ButlerError::Codec {
                format: location.format,
                reason: e.to_string(),
            });
        }

        let bytes = node.read(&location)?.ok_or_else(not_found)?;
        codec::decode(location.format, &bytes)
    }

    /// Returns `true` if [`get`](Self::get) would find the dataset. Nothing
    /// is read or decoded.
    pub fn dataset_exists(&self, dataset_type: &str, data_id: &DataId) -> ButlerResult<bool> {
        Ok(self.locate(dataset_type, data_id)?.is_some())
    }

    /// Distinct values of `format` keys for every dataset matching the
    /// partial `data_id`, merged across searched repositories.
    ///
    /// Tuples are listed in search order of the first repository reporting
    /// them; duplicates collapse.
    pub fn query_metadata(
        &self,
        dataset_type: &str,
        format: &[&str],
        data_id: &DataId,
    ) -> ButlerResult<Vec<Vec<KeyValue>>> {
        let mut seen = BTreeSet::new();
        let mut merged = Vec::new();
        for node in self.graph.search(data_id.tags()) {
            for tuple in require_mapper(node)?.query(dataset_type, format, data_id)? {
                if seen.insert(tuple.clone()) {
                    merged.push(tuple);
                }
            }
        }
        debug!(dataset_type, keys = ?format, results = merged.len(), "queried metadata");
        Ok(merged)
    }

    /// [`query_metadata`](Self::query_metadata) for a single key, flattened.
    pub fn query_values(&self, dataset_type: &str, key: &str, data_id: &DataId) -> ButlerResult<Vec<KeyValue>> {
        Ok(self
            .query_metadata(dataset_type, &[key], data_id)?
            .into_iter()
            .filter_map(|mut tuple| tuple.pop())
            .collect())
    }

    /// Key names and semantic types of `dataset_type` at `level`, from the
    /// first searched repository admitted by `tags` whose mapper knows the
    /// dataset type.
    pub fn get_keys(&self, dataset_type: &str, level: Option<&str>, tags: &TagSet) -> ButlerResult<Option<KeyTypes>> {
        for node in self.graph.search(tags) {
            if let Some(keys) = require_mapper(node)?.keys(dataset_type, level)? {
                return Ok(Some(keys));
            }
        }
        Ok(None)
    }

    /// The default enumeration level of the first searched repository that
    /// declares one.
    pub fn default_level(&self, tags: &TagSet) -> Option<String> {
        self.graph
            .search(tags)
            .filter_map(|n| n.mapper())
            .find_map(|m| m.default_level())
    }

    /// Every data ID of `dataset_type` at `level` (the default level when
    /// `None`) that extends `data_id`.
    pub fn subset(&self, dataset_type: &str, level: Option<&str>, data_id: &DataId) -> ButlerResult<ButlerSubset<'_>> {
        let level = match level {
            Some(l) => Some(l.to_string()),
            None => self.default_level(data_id.tags()),
        };
        ButlerSubset::collect(self, dataset_type, level, data_id)
    }

    // ---- Writes ----

    /// Write `obj` to every output.
    ///
    /// All-or-nothing: every location is resolved and every payload encoded
    /// before the first byte is written, and a failed write restores what
    /// the earlier writes replaced.
    pub fn put<T: Serialize + ?Sized>(&self, obj: &T, dataset_type: &str, data_id: &DataId) -> ButlerResult<()> {
        let mut staged = Vec::new();
        for node in self.graph.outputs() {
            let location = require_mapper(node)?
                .map(dataset_type, data_id, true)?
                .ok_or_else(|| ButlerError::NoWriteLocation {
                    root: node.root().to_string(),
                    dataset_type: dataset_type.to_string(),
                })?;
            let bytes = codec::encode(location.format, obj)?;
            staged.push((node, location, bytes));
        }
        if staged.is_empty() {
            return Err(ButlerError::NoOutputs);
        }

        let mut undo: Vec<(&RepositoryNode, &str, Option<Vec<u8>>)> = Vec::new();
        for (node, location, bytes) in &staged {
            for path in &location.locations {
                let written = node.storage().read(path).and_then(|previous| {
                    node.storage().write(path, bytes)?;
                    Ok(previous)
                });
                match written {
                    Ok(previous) => undo.push((*node, path.as_str(), previous)),
                    Err(e) => {
                        warn!(root = %node.root(), location = %path, error = %e, "write failed, rolling back");
                        rollback(undo);
                        return Err(e.into());
                    }
                }
            }
        }

        info!(dataset_type, data_id = %data_id, outputs = staged.len(), "dataset written");
        Ok(())
    }

    // ---- Resolution ----

    fn locate(
        &self,
        dataset_type: &str,
        data_id: &DataId,
    ) -> ButlerResult<Option<(&RepositoryNode, &Arc<dyn Mapper>, Location)>> {
        for node in self.graph.search(data_id.tags()) {
            let mapper = require_mapper(node)?;
            if let Some(location) = mapper.map(dataset_type, data_id, false)? {
                debug!(root = %node.root(), %location, "resolved dataset");
                return Ok(Some((node, mapper, location)));
            }
        }
        Ok(None)
    }
}

fn require_mapper(node: &RepositoryNode) -> ButlerResult<&Arc<dyn Mapper>> {
    node.mapper()
        .ok_or_else(|| ButlerError::MapperUndetermined(node.root().to_string()))
}

/// Restore every replaced location, newest first. Failures are logged; the
/// original write error is what the caller sees.
fn rollback(undo: Vec<(&RepositoryNode, &str, Option<Vec<u8>>)>) {
    for (node, path, previous) in undo.into_iter().rev() {
        let restored = match previous {
            Some(bytes) => node.storage().write(path, &bytes),
            None => node.storage().remove(path).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(root = %node.root(), location = path, error = %e, "rollback failed");
        }
    }
}
