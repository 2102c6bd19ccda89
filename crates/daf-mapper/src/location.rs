//! Resolved dataset locations.

use std::fmt;

use serde::{Deserialize, Serialize};

use daf_types::{DataId, StorageKind};

/// Byte encoding of a stored dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
    Bincode,
}

impl Format {
    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Bincode => "bin",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Bincode => write!(f, "bincode"),
        }
    }
}

/// Where and how one dataset is stored, as produced by [`Mapper::map`].
///
/// [`Mapper::map`]: crate::Mapper::map
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// The dataset type that was mapped.
    pub dataset_type: String,
    /// Declared type of the stored object, when the mapper knows it.
    pub type_name: Option<String>,
    /// Byte encoding of the stored object.
    pub format: Format,
    /// Storage backend holding the bytes.
    pub storage: StorageKind,
    /// Full storage locations; the first one is primary.
    pub locations: Vec<String>,
    /// The data ID that produced this location.
    pub data_id: DataId,
}

impl Location {
    /// A single-path location.
    pub fn new(
        dataset_type: impl Into<String>,
        format: Format,
        storage: StorageKind,
        location: impl Into<String>,
        data_id: DataId,
    ) -> Self {
        Self {
            dataset_type: dataset_type.into(),
            type_name: None,
            format,
            storage,
            locations: vec![location.into()],
            data_id,
        }
    }

    /// Builder-style declared type.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// The primary storage location.
    pub fn primary(&self) -> &str {
        self.locations.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {} ({})",
            self.dataset_type,
            self.data_id,
            self.primary(),
            self.format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_is_first() {
        let mut loc = Location::new("foo", Format::Json, StorageKind::Memory, "r/a.json", DataId::new());
        loc.locations.push("r/b.json".into());
        assert_eq!(loc.primary(), "r/a.json");
    }

    #[test]
    fn extensions() {
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Yaml.extension(), "yaml");
        assert_eq!(Format::Bincode.extension(), "bin");
    }

    #[test]
    fn format_serde_lowercase() {
        let f: Format = serde_json::from_str("\"bincode\"").unwrap();
        assert_eq!(f, Format::Bincode);
    }

    #[test]
    fn display_mentions_data_id() {
        let loc = Location::new(
            "raw",
            Format::Yaml,
            StorageKind::Posix,
            "/r/raw.yaml",
            DataId::new().with("visit", 1),
        );
        assert_eq!(loc.to_string(), "raw {visit=1} at /r/raw.yaml (yaml)");
    }
}
