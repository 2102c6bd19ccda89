//! Data ID values and the semantic types mappers declare for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A single value in a [`DataId`](crate::DataId).
///
/// Integers sort before strings so that sets of key tuples have a stable,
/// deterministic order regardless of which repository produced them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Str(String),
}

impl KeyValue {
    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(s) => Some(s),
        }
    }

    /// Compare two values by their rendered form.
    ///
    /// Paths are rendered from data IDs, so `2` and `"2"` address the same
    /// dataset and must match each other.
    pub fn matches(&self, other: &KeyValue) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for KeyValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// The semantic type a mapper declares for a data ID key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Int,
    Str,
}

impl KeyType {
    /// Parse a raw string (for example a path component) as this type.
    ///
    /// The result always renders back to exactly `raw`: an integer spelled
    /// some other way than its canonical form (`007`, `+7`) stays a string.
    /// Returns `None` when the text is not a valid value of the type.
    pub fn parse_value(&self, raw: &str) -> Option<KeyValue> {
        match self {
            Self::Int => match raw.parse::<i64>() {
                Ok(n) if n.to_string() == raw => Some(KeyValue::Int(n)),
                Ok(_) => Some(KeyValue::Str(raw.to_string())),
                Err(_) => None,
            },
            Self::Str => Some(KeyValue::Str(raw.to_string())),
        }
    }

    /// Returns `true` if `value` is (or renders as) a valid value of this type.
    pub fn accepts(&self, value: &KeyValue) -> bool {
        match (self, value) {
            (Self::Int, KeyValue::Int(_)) | (Self::Str, _) => true,
            (Self::Int, KeyValue::Str(s)) => s.parse::<i64>().is_ok(),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Str => write!(f, "str"),
        }
    }
}

impl FromStr for KeyType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "str" => Ok(Self::Str),
            other => Err(TypeError::InvalidKeyType(other.to_string())),
        }
    }
}
