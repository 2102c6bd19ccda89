use std::path::Path;

use serde::{Deserialize, Serialize};

use daf_graph::BuildOptions;
use daf_store::DEFAULT_CONFIG_FILE;

use crate::error::{ButlerError, ButlerResult};

/// Session-wide settings, shared by every butler opened from one context.
///
/// Loadable from TOML; missing keys take their defaults:
///
/// ```toml
/// config_file_name = "repositoryCfg.yaml"
/// promote_inputs_to_parents = true
/// persist_input_configs = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ButlerSettings {
    /// Name of the configuration record inside each repository root.
    pub config_file_name: String,
    /// Record explicit inputs as parents of existing outputs.
    pub promote_inputs_to_parents: bool,
    /// Persist configurations synthesized for inputs opened with an explicit
    /// mapper but no stored record.
    pub persist_input_configs: bool,
}

impl Default for ButlerSettings {
    fn default() -> Self {
        Self {
            config_file_name: DEFAULT_CONFIG_FILE.to_string(),
            promote_inputs_to_parents: true,
            persist_input_configs: false,
        }
    }
}

impl ButlerSettings {
    pub fn from_toml_str(text: &str) -> ButlerResult<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| ButlerError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no context can be built from.
    pub fn validate(&self) -> ButlerResult<()> {
        let name = &self.config_file_name;
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ButlerError::Settings(format!(
                "config_file_name must be a plain file name, got {name:?}"
            )));
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> ButlerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            promote_inputs_to_parents: self.promote_inputs_to_parents,
            persist_input_configs: self.persist_input_configs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let s = ButlerSettings::default();
        assert_eq!(s.config_file_name, "repositoryCfg.yaml");
        assert!(s.promote_inputs_to_parents);
        assert!(!s.persist_input_configs);
        assert_eq!(s.build_options(), BuildOptions::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = ButlerSettings::from_toml_str("persist_input_configs = true\n").unwrap();
        assert!(s.persist_input_configs);
        assert!(s.promote_inputs_to_parents);
        assert_eq!(s.config_file_name, DEFAULT_CONFIG_FILE);
    }

    #[test]
    fn unknown_key_rejected() {
        let err = ButlerSettings::from_toml_str("verbose = true\n").unwrap_err();
        assert!(matches!(err, ButlerError::Settings(_)));
    }

    #[test]
    fn nested_file_name_rejected() {
        let err = ButlerSettings::from_toml_str("config_file_name = \"a/b.yaml\"\n").unwrap_err();
        assert!(matches!(err, ButlerError::Settings(_)));
    }

    #[test]
    fn validate_rejects_paths() {
        for name in ["", ".", "..", "a/b.yaml", "a\\b.yaml"] {
            let s = ButlerSettings {
                config_file_name: name.into(),
                ..Default::default()
            };
            assert!(matches!(s.validate(), Err(ButlerError::Settings(_))), "{name:?} accepted");
        }
        ButlerSettings::default().validate().unwrap();
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("butler.toml");
        std::fs::write(&path, "config_file_name = \"repo.yaml\"\npromote_inputs_to_parents = false\n").unwrap();
        let s = ButlerSettings::from_file(&path).unwrap();
        assert_eq!(s.config_file_name, "repo.yaml");
        assert!(!s.promote_inputs_to_parents);
    }
}
