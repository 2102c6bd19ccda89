use std::sync::Arc;

use daf_mapper::MapperRegistry;
use daf_store::{ConfigStore, StorageSet};

use crate::error::ButlerResult;
use crate::settings::ButlerSettings;

/// Everything a session needs that is not specific to one session: the
/// mapper registry, the storage backends and the settings.
///
/// There is no process-wide registry; every butler is opened from a
/// context. Sessions opened from clones of one context share the same
/// in-memory storage.
#[derive(Clone, Debug)]
pub struct ButlerContext {
    registry: Arc<MapperRegistry>,
    store: ConfigStore,
    settings: ButlerSettings,
}

impl ButlerContext {
    /// Fails if `settings` do not validate.
    pub fn new(registry: MapperRegistry, storages: StorageSet, settings: ButlerSettings) -> ButlerResult<Self> {
        settings.validate()?;
        Ok(Self::assemble(registry, storages, settings))
    }

    /// A context with the built-in mappers, default backends and the given
    /// settings.
    pub fn with_settings(settings: ButlerSettings) -> ButlerResult<Self> {
        Self::new(MapperRegistry::with_builtins(), StorageSet::new(), settings)
    }

    fn assemble(registry: MapperRegistry, storages: StorageSet, settings: ButlerSettings) -> Self {
        let store = ConfigStore::with_file_name(storages, settings.config_file_name.clone());
        Self {
            registry: Arc::new(registry),
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn storages(&self) -> &StorageSet {
        self.store.storages()
    }

    pub fn settings(&self) -> &ButlerSettings {
        &self.settings
    }
}

impl Default for ButlerContext {
    fn default() -> Self {
        Self::assemble(MapperRegistry::with_builtins(), StorageSet::new(), ButlerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ButlerError;

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = ButlerSettings {
            config_file_name: String::new(),
            ..Default::default()
        };
        let err = ButlerContext::with_settings(settings).unwrap_err();
        assert!(matches!(err, ButlerError::Settings(_)));
    }

    #[test]
    fn store_uses_configured_file_name() {
        let settings = ButlerSettings {
            config_file_name: "repo.yaml".into(),
            ..Default::default()
        };
        let ctx = ButlerContext::with_settings(settings).unwrap();
        assert_eq!(ctx.settings().config_file_name, "repo.yaml");
        let root = daf_types::RepoRoot::parse("mem://r").unwrap();
        assert_eq!(ctx.store().record_location(&root), root.join("repo.yaml"));
    }
}
