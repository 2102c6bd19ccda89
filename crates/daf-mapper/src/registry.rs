//! Name-to-type resolution for mappers.
//!
//! Configurations persist a mapper as a name. Turning that name back into a
//! constructible type is a capability the caller injects through a
//! [`MapperRegistry`]; there is no process-wide lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::file_mapper::FileMapper;
use crate::id::{MapperId, MapperType};
use crate::mapper::{Mapper, MapperInit, MapperKind};

/// Registry of mapper types, keyed by canonical name and by alias.
#[derive(Clone, Debug, Default)]
pub struct MapperRegistry {
    types: HashMap<String, MapperType>,
    aliases: HashMap<String, String>,
}

impl MapperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in [`FileMapper`] registered under its
    /// canonical name and the alias `FileMapper`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_kind::<FileMapper>();
        registry.alias("FileMapper", FileMapper::TYPE_NAME);
        registry
    }

    /// Register a mapper type under its canonical name.
    pub fn register(&mut self, mapper_type: MapperType) -> &mut Self {
        debug!(mapper = mapper_type.name(), "registered mapper type");
        self.types.insert(mapper_type.name().to_string(), mapper_type);
        self
    }

    /// Register `M` under [`MapperKind::TYPE_NAME`].
    pub fn register_kind<M: MapperKind>(&mut self) -> &mut Self {
        self.register(MapperType::of::<M>())
    }

    /// Make `alias` resolve to the canonical name `target`.
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Look up a type by canonical name or alias.
    pub fn lookup(&self, name: &str) -> Option<&MapperType> {
        if let Some(t) = self.types.get(name) {
            return Some(t);
        }
        self.aliases.get(name).and_then(|target| self.types.get(target))
    }

    /// Reduce any representation of a mapper to its canonical type name.
    ///
    /// A type, an instance of that type, and a registered name or alias of
    /// that type all yield the same string.
    pub fn canonical(&self, id: &MapperId) -> MapperResult<String> {
        match id {
            MapperId::Type(t) => Ok(t.name().to_string()),
            MapperId::Instance(m) => Ok(m.type_name().to_string()),
            MapperId::Name(name) => self
                .lookup(name)
                .map(|t| t.name().to_string())
                .ok_or_else(|| MapperError::UnknownMapper(name.clone())),
        }
    }

    /// Returns `true` if `a` and `b` denote the same mapper type.
    pub fn same_type(&self, a: &MapperId, b: &MapperId) -> MapperResult<bool> {
        Ok(self.canonical(a)? == self.canonical(b)?)
    }

    /// Produce a live mapper for a repository.
    ///
    /// Instances are shared as-is; types and names are constructed from
    /// `init`.
    pub fn instantiate(&self, id: &MapperId, init: &MapperInit) -> MapperResult<Arc<dyn Mapper>> {
        match id {
            MapperId::Instance(m) => Ok(Arc::clone(m)),
            MapperId::Type(t) => t.construct(init),
            MapperId::Name(name) => self
                .lookup(name)
                .ok_or_else(|| MapperError::UnknownMapper(name.clone()))?
                .construct(init),
        }
    }

    /// The mapper shared by every candidate, or `None` if there are no
    /// candidates, they disagree, or one cannot be resolved.
    ///
    /// This is the lenient form; [`MapperResolver`](crate::MapperResolver)
    /// is the fail-fast form used when a configuration is created.
    pub fn default_mapper<'a>(&self, ids: impl IntoIterator<Item = &'a MapperId>) -> Option<String> {
        let mut names = BTreeSet::new();
        for id in ids {
            names.insert(self.canonical(id).ok()?);
        }
        if names.len() == 1 {
            names.into_iter().next()
        } else {
            None
        }
    }
}
