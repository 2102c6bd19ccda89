//! A template-driven mapper storing one file per dataset.
//!
//! Each declared dataset type has a path template such as
//! `raw/raw_v{visit}_f{filter}.json`; placeholders are filled from the data
//! ID. Templates compile to anchored regular expressions so stored files can
//! be enumerated back into key tuples.
//!
//! Dataset types without a declaration use a generic layout,
//! `<datasetType>/<k1>=<v1>&<k2>=<v2>.<ext>` (keys sorted, `_` when the data
//! ID is empty), which is self-describing and can also be enumerated.
//!
//! Example arguments (`mapperArgs` in the repository configuration):
//!
//! ```json
//! {
//!   "format": "json",
//!   "default_level": "sensor",
//!   "levels": { "visit": ["visit"], "sensor": ["visit", "raft", "sensor"] },
//!   "datasets": {
//!     "raw": { "template": "raw/v{visit}_R{raft}_S{sensor}_C{amp}.json",
//!              "keys": { "visit": "int" } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use daf_store::Storage;
use daf_types::{DataId, KeyType, KeyValue, RepoRoot};

use crate::error::{MapperError, MapperResult};
use crate::location::{Format, Location};
use crate::mapper::{KeyTuples, KeyTypes, Mapper, MapperInit, MapperKind};

const GENERIC_EMPTY_STEM: &str = "_";

/// Characters never allowed in text placed in a path.
const SEPARATORS: &[char] = &['/', '\\', '\0'];
/// Additionally reserved by the generic layout's `k=v&k=v` stems.
const GENERIC_RESERVED: &[char] = &['/', '\\', '\0', '&', '='];

/// Check that `text` can be one path component without escaping its
/// directory.
fn path_text(dataset_type: &str, key: &str, text: String, reserved: &[char]) -> MapperResult<String> {
    if text.is_empty() || text == "." || text == ".." || text.contains(reserved) {
        return Err(MapperError::InvalidValue {
            dataset_type: dataset_type.to_string(),
            key: key.to_string(),
            value: text,
        });
    }
    Ok(text)
}

/// Constructor arguments of [`FileMapper`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileMapperArgs {
    /// Format used by datasets that do not choose their own.
    pub format: Format,
    /// Level used by subsets when none is requested.
    pub default_level: Option<String>,
    /// Level name to the keys that identify one item at that level.
    pub levels: BTreeMap<String, Vec<String>>,
    /// Declared dataset types.
    pub datasets: BTreeMap<String, DatasetSpec>,
    /// Known key rows. When present, queries enumerate these rows instead of
    /// scanning stored files.
    pub registry: Option<Vec<BTreeMap<String, KeyValue>>>,
}

/// Declaration of one dataset type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetSpec {
    /// Path template relative to the repository root.
    pub template: String,
    /// Semantic key types; template keys not listed here are strings.
    pub keys: BTreeMap<String, KeyType>,
    /// Format override for this dataset type.
    pub format: Option<Format>,
    /// Declared type of the stored objects.
    pub type_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Key(String),
}

#[derive(Debug)]
struct CompiledDataset {
    segments: Vec<Segment>,
    pattern: Regex,
    /// Key name of each capture group, in group order.
    groups: Vec<String>,
    key_types: KeyTypes,
    format: Format,
    type_name: Option<String>,
}

impl CompiledDataset {
    fn compile(spec: &DatasetSpec, default_format: Format) -> MapperResult<Self> {
        let segments = parse_template(&spec.template)?;

        let mut pattern = String::from("^");
        let mut groups = Vec::new();
        let mut key_types = spec.keys.clone();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Key(key) => {
                    pattern.push_str("([^/]+?)");
                    groups.push(key.clone());
                    key_types.entry(key.clone()).or_insert(KeyType::Str);
                }
            }
        }
        pattern.push('$');

        let pattern = Regex::new(&pattern).map_err(|e| MapperError::Template {
            template: spec.template.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            segments,
            pattern,
            groups,
            key_types,
            format: spec.format.unwrap_or(default_format),
            type_name: spec.type_name.clone(),
        })
    }

    fn render(&self, dataset_type: &str, data_id: &DataId) -> MapperResult<String> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Key(key) => {
                    let value = data_id.get(key).ok_or_else(|| MapperError::MissingKey {
                        dataset_type: dataset_type.to_string(),
                        key: key.clone(),
                    })?;
                    path.push_str(&path_text(dataset_type, key, value.to_string(), SEPARATORS)?);
                }
            }
        }
        Ok(path)
    }

    /// Recover the key row encoded in a relative path, if it matches.
    fn parse(&self, relative: &str) -> Option<BTreeMap<String, KeyValue>> {
        let captures = self.pattern.captures(relative)?;
        let mut row = BTreeMap::new();
        for (i, key) in self.groups.iter().enumerate() {
            let raw = captures.get(i + 1)?.as_str();
            let key_type = self.key_types.get(key).copied().unwrap_or(KeyType::Str);
            let value = key_type.parse_value(raw)?;
            if let Some(previous) = row.get(key) {
                if previous != &value {
                    return None;
                }
            }
            row.insert(key.clone(), value);
        }
        Some(row)
    }
}

fn parse_template(template: &str) -> MapperResult<Vec<Segment>> {
    let err = |reason: &str| MapperError::Template {
        template: template.to_string(),
        reason: reason.to_string(),
    };
    if template.is_empty() {
        return Err(err("template must not be empty"));
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(err("unclosed placeholder")),
                        Some(k) => key.push(k),
                    }
                }
                if key.is_empty() {
                    return Err(err("empty placeholder"));
                }
                segments.push(Segment::Key(key));
            }
            '}' => return Err(err("unmatched '}'")),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Mapper storing each dataset as one file under the repository root.
pub struct FileMapper {
    root: RepoRoot,
    storage: Arc<dyn Storage>,
    args: FileMapperArgs,
    datasets: BTreeMap<String, CompiledDataset>,
}

impl FileMapper {
    /// Build a mapper for `root` from already parsed arguments.
    pub fn new(root: RepoRoot, storage: Arc<dyn Storage>, args: FileMapperArgs) -> MapperResult<Self> {
        let mut datasets = BTreeMap::new();
        for (name, spec) in &args.datasets {
            datasets.insert(name.clone(), CompiledDataset::compile(spec, args.format)?);
        }
        Ok(Self {
            root,
            storage,
            args,
            datasets,
        })
    }

    /// The arguments this mapper was built from.
    pub fn args(&self) -> &FileMapperArgs {
        &self.args
    }

    /// Directory of an undeclared dataset type.
    fn generic_dir(dataset_type: &str) -> MapperResult<String> {
        path_text(dataset_type, "dataset type", dataset_type.to_string(), GENERIC_RESERVED)
    }

    fn generic_path(&self, dataset_type: &str, data_id: &DataId) -> MapperResult<String> {
        let dir = Self::generic_dir(dataset_type)?;
        let stem = if data_id.is_empty() {
            GENERIC_EMPTY_STEM.to_string()
        } else {
            let mut pairs = Vec::with_capacity(data_id.len());
            for (k, v) in data_id.iter() {
                let key = path_text(dataset_type, k, k.to_string(), GENERIC_RESERVED)?;
                let value = path_text(dataset_type, k, v.to_string(), GENERIC_RESERVED)?;
                pairs.push(format!("{key}={value}"));
            }
            pairs.join("&")
        };
        Ok(format!("{dir}/{stem}.{}", self.args.format.extension()))
    }

    fn generic_parse(&self, relative: &str) -> Option<BTreeMap<String, KeyValue>> {
        let stem = relative.strip_suffix(&format!(".{}", self.args.format.extension()))?;
        if stem.contains('/') {
            return None;
        }
        let mut row = BTreeMap::new();
        if stem == GENERIC_EMPTY_STEM {
            return Some(row);
        }
        for pair in stem.split('&') {
            let (k, v) = pair.split_once('=')?;
            let value = KeyType::Int
                .parse_value(v)
                .unwrap_or_else(|| KeyValue::Str(v.to_string()));
            row.insert(k.to_string(), value);
        }
        Some(row)
    }

    /// Every key row this repository holds for `dataset_type`.
    fn rows(&self, dataset_type: &str) -> MapperResult<Vec<BTreeMap<String, KeyValue>>> {
        if let Some(registry) = &self.args.registry {
            return Ok(registry.clone());
        }
        match self.datasets.get(dataset_type) {
            Some(compiled) => {
                let listed = self.storage.list(&self.root.join(""))?;
                Ok(listed.iter().filter_map(|rel| compiled.parse(rel)).collect())
            }
            None => {
                let listed = self.storage.list(&self.root.join(&Self::generic_dir(dataset_type)?))?;
                Ok(listed.iter().filter_map(|rel| self.generic_parse(rel)).collect())
            }
        }
    }
}

impl MapperKind for FileMapper {
    const TYPE_NAME: &'static str = "daf.mapper.FileMapper";

    fn construct(init: &MapperInit) -> MapperResult<Self> {
        let args = match &init.args {
            None | Some(serde_json::Value::Null) => FileMapperArgs::default(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| MapperError::InvalidArgs {
                mapper: Self::TYPE_NAME.to_string(),
                reason: e.to_string(),
            })?,
        };
        Self::new(init.root.clone(), Arc::clone(&init.storage), args)
    }
}

impl Mapper for FileMapper {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn map(&self, dataset_type: &str, data_id: &DataId, write: bool) -> MapperResult<Option<Location>> {
        let (relative, format, type_name) = match self.datasets.get(dataset_type) {
            Some(compiled) => (
                compiled.render(dataset_type, data_id)?,
                compiled.format,
                compiled.type_name.clone(),
            ),
            None => (self.generic_path(dataset_type, data_id)?, self.args.format, None),
        };
        let full = self.root.join(&relative);

        if !write && !self.storage.exists(&full)? {
            trace!(root = %self.root, location = %full, "no dataset at location");
            return Ok(None);
        }

        let mut location = Location::new(dataset_type, format, self.root.kind(), full, data_id.clone());
        location.type_name = type_name;
        Ok(Some(location))
    }

    fn query(&self, dataset_type: &str, format: &[&str], data_id: &DataId) -> MapperResult<KeyTuples> {
        if self.args.registry.is_none() {
            if let Some(compiled) = self.datasets.get(dataset_type) {
                if let Some(unknown) = format.iter().find(|k| !compiled.key_types.contains_key(**k)) {
                    return Err(MapperError::UnknownKey {
                        dataset_type: dataset_type.to_string(),
                        key: unknown.to_string(),
                    });
                }
            }
        }

        let mut tuples = KeyTuples::new();
        for row in self.rows(dataset_type)? {
            if !data_id.is_satisfied_by(&row) {
                continue;
            }
            let projected: Option<Vec<KeyValue>> = format.iter().map(|k| row.get(*k).cloned()).collect();
            if let Some(tuple) = projected {
                tuples.insert(tuple);
            }
        }
        Ok(tuples)
    }

    fn keys(&self, dataset_type: &str, level: Option<&str>) -> MapperResult<Option<KeyTypes>> {
        let Some(compiled) = self.datasets.get(dataset_type) else {
            return Ok(None);
        };
        let all = compiled.key_types.clone();
        let Some(level_keys) = level.and_then(|l| self.args.levels.get(l)) else {
            return Ok(Some(all));
        };
        Ok(Some(
            all.into_iter()
                .filter(|(k, _)| level_keys.iter().any(|l| l == k))
                .collect(),
        ))
    }

    fn default_level(&self) -> Option<String> {
        self.args.default_level.clone()
    }
}

impl std::fmt::Debug for FileMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMapper")
            .field("root", &self.root)
            .field("datasets", &self.datasets.keys().collect::<Vec<_>>())
            .finish()
    }
}
