//! Session-scoped repository tags.
//!
//! A tag is an opaque label attached to the arguments a repository was
//! opened with, never to the stored data. A query carrying tags only sees
//! repositories whose tag set intersects the requested one; an untagged
//! query sees every repository.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered set of tags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a tag. Returns `true` if it was not already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Returns `true` if the set contains `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Add every tag of `other` to this set.
    pub fn union_with(&mut self, other: &TagSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Returns `true` if the two sets share at least one tag.
    pub fn intersects(&self, other: &TagSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.0.iter().any(|t| large.0.contains(t))
    }

    /// Whether a repository carrying `self` takes part in a query that
    /// requests `requested`. Untagged queries match everything.
    pub fn admits(&self, requested: &TagSet) -> bool {
        requested.is_empty() || self.intersects(requested)
    }

    /// Iterate over the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for TagSet {
    fn from(tag: &str) -> Self {
        std::iter::once(tag).collect()
    }
}

impl From<String> for TagSet {
    fn from(tag: String) -> Self {
        std::iter::once(tag).collect()
    }
}

impl<S: Into<String>> From<Vec<S>> for TagSet {
    fn from(tags: Vec<S>) -> Self {
        tags.into_iter().collect()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for TagSet {
    fn from(tags: [S; N]) -> Self {
        tags.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_tag() {
        let tags = TagSet::from("one");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("one"));
    }

    #[test]
    fn intersects_on_shared_tag() {
        let node = TagSet::from("baArgs");
        assert!(node.intersects(&TagSet::from(["baArgs", "foo"])));
        assert!(!node.intersects(&TagSet::from("foo")));
    }

    #[test]
    fn untagged_query_admits_everything() {
        assert!(TagSet::new().admits(&TagSet::new()));
        assert!(TagSet::from("one").admits(&TagSet::new()));
        assert!(!TagSet::new().admits(&TagSet::from("one")));
    }

    #[test]
    fn union_merges() {
        let mut a = TagSet::from("one");
        a.union_with(&TagSet::from(["two", "one"]));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn display_is_sorted() {
        let tags = TagSet::from(["b", "a"]);
        assert_eq!(tags.to_string(), "{a, b}");
    }

    fn tag_set() -> impl Strategy<Value = TagSet> {
        proptest::collection::vec("[a-d]", 0..4).prop_map(TagSet::from)
    }

    proptest! {
        #[test]
        fn intersects_is_symmetric(a in tag_set(), b in tag_set()) {
            prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        }

        #[test]
        fn union_admits_what_either_admitted(a in tag_set(), b in tag_set(), q in tag_set()) {
            let mut u = a.clone();
            u.union_with(&b);
            prop_assert_eq!(u.admits(&q), a.admits(&q) || b.admits(&q));
        }
    }
}
