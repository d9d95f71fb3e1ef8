//! Label values and resolved label sets.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

/// Value written for a label whose accessor is missing or failed.
pub const UNRESOLVED: &str = "";

/// A typed label value as returned by an accessor.
///
/// Values stay typed through resolution and are only rendered to strings
/// when a [`LabelSet`] is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Int(v) => write!(f, "{v}"),
            LabelValue::Float(v) => write!(f, "{v}"),
            LabelValue::Bool(v) => write!(f, "{v}"),
            LabelValue::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::Int(v)
    }
}

impl From<i32> for LabelValue {
    fn from(v: i32) -> Self {
        LabelValue::Int(v as i64)
    }
}

impl From<u32> for LabelValue {
    fn from(v: u32) -> Self {
        LabelValue::Int(v as i64)
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::Float(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        LabelValue::Bool(v)
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        LabelValue::String(v)
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        LabelValue::String(v.to_string())
    }
}

/// Resolved label values for one (metric, entity) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    values: BTreeMap<String, String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.values.insert(label.into(), value.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.values.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the label is present but carries the sentinel value.
    pub fn is_unresolved(&self, label: &str) -> bool {
        self.get(label) == Some(UNRESOLVED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrowed view in the shape the exposition library expects.
    pub fn as_map(&self) -> HashMap<&str, &str> {
        self.iter().collect()
    }
}

impl FromIterator<(String, String)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
