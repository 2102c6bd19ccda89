//! Data IDs: the symbolic keys datasets are addressed by.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::KeyValue;
use crate::tags::TagSet;

/// A mapping from key name to value identifying one logical dataset, plus an
/// optional tag filter.
///
/// Two data IDs with the same keys but different tags are distinct query
/// scopes; equality and hashing take the tags into account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataId {
    keys: BTreeMap<String, KeyValue>,
    #[serde(default, skip_serializing_if = "TagSet::is_empty")]
    tags: TagSet,
}

impl DataId {
    /// Create an empty, untagged data ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a key/value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    /// Builder-style tag filter. Accepts a single tag or a collection.
    pub fn tagged(mut self, tags: impl Into<TagSet>) -> Self {
        self.tags.union_with(&tags.into());
        self
    }

    /// Insert a key/value pair, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<KeyValue>) -> Option<KeyValue> {
        self.keys.insert(key.into(), value.into())
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.keys.get(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Number of keys (tags are not counted).
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are set.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The key/value mapping without tags.
    pub fn keys(&self) -> &BTreeMap<String, KeyValue> {
        &self.keys
    }

    /// The requested tag filter (empty when untagged).
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// A copy of this data ID with every key of `other` added on top.
    /// Tags are kept from `self`.
    pub fn merged(&self, other: &DataId) -> DataId {
        let mut merged = self.clone();
        for (k, v) in &other.keys {
            merged.keys.insert(k.clone(), v.clone());
        }
        merged
    }

    /// A copy restricted to the given keys. Tags are kept.
    pub fn restricted<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> DataId {
        let mut out = DataId {
            keys: BTreeMap::new(),
            tags: self.tags.clone(),
        };
        for k in keys {
            if let Some(v) = self.keys.get(k) {
                out.keys.insert(k.to_string(), v.clone());
            }
        }
        out
    }

    /// Returns `true` if every key of `self` is present in `candidate` with a
    /// matching value.
    pub fn is_satisfied_by(&self, candidate: &BTreeMap<String, KeyValue>) -> bool {
        self.keys
            .iter()
            .all(|(k, v)| candidate.get(k).is_some_and(|c| c.matches(v)))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.keys.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", pairs.join(", "))?;
        if !self.tags.is_empty() {
            write!(f, " tags={}", self.tags)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<KeyValue>> FromIterator<(K, V)> for DataId {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            tags: TagSet::new(),
        }
    }
}

impl From<BTreeMap<String, KeyValue>> for DataId {
    fn from(keys: BTreeMap<String, KeyValue>) -> Self {
        Self {
            keys,
            tags: TagSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_keys_and_tags() {
        let id = DataId::new().with("bar", 1).with("filter", "g").tagged("one");
        assert_eq!(id.len(), 2);
        assert_eq!(id.get("bar"), Some(&KeyValue::Int(1)));
        assert!(id.tags().contains("one"));
    }

    #[test]
    fn tags_distinguish_scopes() {
        let plain = DataId::new().with("bar", 1);
        let tagged = plain.clone().tagged("one");
        assert_ne!(plain, tagged);
        assert_eq!(plain.keys(), tagged.keys());
    }

    #[test]
    fn merged_overrides_and_keeps_tags() {
        let base = DataId::new().with("visit", 1).tagged("t");
        let extra = DataId::new().with("visit", 2).with("ccd", 3);
        let m = base.merged(&extra);
        assert_eq!(m.get("visit"), Some(&KeyValue::Int(2)));
        assert_eq!(m.get("ccd"), Some(&KeyValue::Int(3)));
        assert!(m.tags().contains("t"));
    }

    #[test]
    fn restricted_drops_other_keys() {
        let id = DataId::new().with("visit", 1).with("ccd", 3);
        let r = id.restricted(["visit", "missing"]);
        assert_eq!(r.len(), 1);
        assert!(r.contains_key("visit"));
    }

    #[test]
    fn satisfied_by_superset() {
        let partial = DataId::new().with("filter", "g");
        let mut row = BTreeMap::new();
        row.insert("filter".to_string(), KeyValue::from("g"));
        row.insert("visit".to_string(), KeyValue::from(2));
        assert!(partial.is_satisfied_by(&row));
        assert!(DataId::new().is_satisfied_by(&row));
        assert!(!DataId::new().with("filter", "r").is_satisfied_by(&row));
        assert!(!DataId::new().with("ccd", 1).is_satisfied_by(&row));
    }

    #[test]
    fn display_lists_pairs() {
        let id = DataId::new().with("bar", 1).tagged("one");
        assert_eq!(id.to_string(), "{bar=1} tags={one}");
    }

    #[test]
    fn from_iterator() {
        let id: DataId = [("visit", 1), ("ccd", 2)].into_iter().collect();
        assert_eq!(id.len(), 2);
        assert!(id.tags().is_empty());
    }

    #[test]
    fn serde_roundtrip_json() {
        let id = DataId::new().with("bar", 1).tagged("x");
        let json = serde_json::to_string(&id).unwrap();
        let back: DataId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
