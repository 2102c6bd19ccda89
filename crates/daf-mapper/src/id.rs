//! Mapper identity.
//!
//! A mapper can be named three ways: by type, by a live instance, or by a
//! name the registry resolves. All three reduce to one canonical type name
//! (see [`MapperRegistry::canonical`]) before they are compared or
//! persisted.
//!
//! [`MapperRegistry::canonical`]: crate::MapperRegistry::canonical

use std::fmt;
use std::sync::Arc;

use crate::error::MapperResult;
use crate::mapper::{Mapper, MapperInit, MapperKind};

/// Constructor shared by every repository using a mapper type.
pub type MapperFactory = Arc<dyn Fn(&MapperInit) -> MapperResult<Arc<dyn Mapper>> + Send + Sync>;

/// A constructible mapper type: its canonical name plus a factory.
#[derive(Clone)]
pub struct MapperType {
    name: String,
    factory: MapperFactory,
}

impl MapperType {
    /// A mapper type from an explicit name and factory.
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&MapperInit) -> MapperResult<Arc<dyn Mapper>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// The mapper type of `M`.
    pub fn of<M: MapperKind>() -> Self {
        Self::new(M::TYPE_NAME, |init| {
            let mapper: Arc<dyn Mapper> = Arc::new(M::construct(init)?);
            Ok(mapper)
        })
    }

    /// Canonical type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a mapper for one repository.
    pub fn construct(&self, init: &MapperInit) -> MapperResult<Arc<dyn Mapper>> {
        (self.factory)(init)
    }
}

impl fmt::Debug for MapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperType").field("name", &self.name).finish()
    }
}

impl PartialEq for MapperType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MapperType {}

/// A mapper named by type, by instance, or by name.
#[derive(Clone)]
pub enum MapperId {
    /// A type reference.
    Type(MapperType),
    /// An already constructed mapper; used as-is for its repository.
    Instance(Arc<dyn Mapper>),
    /// A canonical type name or registered alias.
    Name(String),
}

impl MapperId {
    /// The type of `M`.
    pub fn of<M: MapperKind>() -> Self {
        Self::Type(MapperType::of::<M>())
    }

    /// An existing instance.
    pub fn instance(mapper: impl Mapper + 'static) -> Self {
        Self::Instance(Arc::new(mapper))
    }

    /// A name to be resolved through the registry.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Debug for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => write!(f, "Type({})", t.name()),
            Self::Instance(m) => write!(f, "Instance({})", m.type_name()),
            Self::Name(n) => write!(f, "Name({n})"),
        }
    }
}

impl From<MapperType> for MapperId {
    fn from(t: MapperType) -> Self {
        Self::Type(t)
    }
}

impl From<Arc<dyn Mapper>> for MapperId {
    fn from(m: Arc<dyn Mapper>) -> Self {
        Self::Instance(m)
    }
}

impl From<&str> for MapperId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for MapperId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}
