//! Plain attribute storage.
//!
//! The lowest layer of a model: a flat, ordered mapping from attribute names
//! to raw values. Reads never fail; unknown names are simply absent. A key
//! holding `null` counts as *not set*, which is what lets typed sub-document
//! and relation layers shadow a null attribute.

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    values: IndexMap<String, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Present with a non-null value.
    pub fn is_set(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(value) if !value.is_null())
    }

    /// Present at all, null included.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Drop the entry entirely, returning the removed value.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
