//! Typed values and dictionaries for authored metadata.
//!
//! Clip metadata is authored as key-value dictionaries on prims. [`Value`]
//! is the closed set of types this library reads and writes; [`Dictionary`]
//! is an ordered string-keyed map with the recursive strong-over-weak merge
//! used during composition.

use std::collections::BTreeMap;

use glam::DVec2;

use crate::scene::StringListOp;

/// A typed metadata value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Double(f64),
    String(String),
    /// An asset path; distinct from String so that authored intent survives
    /// round-trips, matching the scene description's type system.
    AssetPath(String),
    StringArray(Vec<String>),
    AssetPathArray(Vec<String>),
    /// Array of 2-vectors, used for the (time, clipIndex) active table and
    /// the (stageTime, clipTime) times table.
    Vec2dArray(Vec<DVec2>),
    DoubleArray(Vec<f64>),
    Dictionary(Dictionary),
    StringListOp(StringListOp),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_asset_path(&self) -> Option<&str> {
        match self {
            Value::AssetPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_asset_path_array(&self) -> Option<&[String]> {
        match self {
            Value::AssetPathArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2d_array(&self) -> Option<&[DVec2]> {
        match self {
            Value::Vec2dArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            Value::DoubleArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string_list_op(&self) -> Option<&StringListOp> {
        match self {
            Value::StringListOp(op) => Some(op),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::Dictionary(d)
    }
}

impl From<StringListOp> for Value {
    fn from(op: StringListOp) -> Self {
        Value::StringListOp(op)
    }
}

impl From<Vec<DVec2>> for Value {
    fn from(v: Vec<DVec2>) -> Self {
        Value::Vec2dArray(v)
    }
}

/// Ordered string-keyed dictionary.
///
/// Backed by a BTreeMap so iteration order is deterministic; composition
/// results must never depend on hash-map iteration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: BTreeMap<String, Value>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Set a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove a key and return its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Recursive strong-over-weak merge.
    ///
    /// Produces a dictionary where every key from `strong` overrides the
    /// same key in `weak`, except that nested dictionaries under the same
    /// key are merged recursively rather than replaced. Pure function;
    /// neither input is mutated.
    pub fn over_recursive(strong: &Dictionary, weak: &Dictionary) -> Dictionary {
        let mut merged = weak.clone();
        for (key, strong_value) in &strong.entries {
            let recurse = matches!(
                (merged.entries.get(key), strong_value),
                (Some(Value::Dictionary(_)), Value::Dictionary(_))
            );
            if recurse {
                if let (Some(Value::Dictionary(weak_child)), Value::Dictionary(strong_child)) =
                    (merged.entries.get_mut(key), strong_value)
                {
                    let combined = Dictionary::over_recursive(strong_child, &*weak_child);
                    *weak_child = combined;
                }
            } else {
                merged.entries.insert(key.clone(), strong_value.clone());
            }
        }
        merged
    }
}
