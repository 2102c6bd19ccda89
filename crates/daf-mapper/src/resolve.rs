//! Inference of the effective mapper for a repository.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::id::MapperId;
use crate::registry::MapperRegistry;

/// Decides which mapper a repository uses from an explicit choice and the
/// mappers of the repositories feeding it.
///
/// Resolution rules:
/// 1. An explicit mapper always wins.
/// 2. Otherwise the distinct inherited mapper types (compared by canonical
///    type name, not by how they were written) decide: none leaves the
///    mapper undetermined, one is adopted, two or more fail with
///    [`MapperError::Ambiguous`]. Guessing would persist a wrong mapper
///    into a configuration that can never change.
#[derive(Debug, Clone, Copy)]
pub struct MapperResolver<'a> {
    registry: &'a MapperRegistry,
}

impl<'a> MapperResolver<'a> {
    pub fn new(registry: &'a MapperRegistry) -> Self {
        Self { registry }
    }

    /// Resolve to a canonical type name, or `None` if undetermined.
    pub fn resolve<'i>(
        &self,
        explicit: Option<&MapperId>,
        inherited: impl IntoIterator<Item = Option<&'i MapperId>>,
    ) -> MapperResult<Option<String>> {
        if let Some(id) = explicit {
            return self.registry.canonical(id).map(Some);
        }

        let mut distinct = BTreeSet::new();
        for id in inherited.into_iter().flatten() {
            distinct.insert(self.registry.canonical(id)?);
        }

        match distinct.len() {
            0 => Ok(None),
            1 => {
                let name = distinct.into_iter().next();
                debug!(mapper = ?name, "inferred mapper from parents");
                Ok(name)
            }
            _ => Err(MapperError::Ambiguous(distinct.into_iter().collect())),
        }
    }
}
