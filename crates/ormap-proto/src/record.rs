//! Raw records exchanged with data stores.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A raw record returned by a data store.
///
/// Values are keyed by property name. Lookups ignore ASCII case so that a
/// store which normalizes column names (`SURNAME`, `surname`) still resolves.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Concrete class the row was stored as, when the store knows it.
    pub class_name: Option<String>,
    /// Property values in store order.
    pub values: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record tagged with its concrete class.
    pub fn for_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            values: Vec::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value, replacing any existing value with a case-insensitively equal name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self
            .values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Get a value by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Remove a value by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self
            .values
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.values.remove(index).1)
    }

    /// Check whether a value with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a record from a JSON object; non-object input yields an empty record.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut record = Record::new();
        if let serde_json::Value::Object(map) = json {
            for (name, value) in map {
                record.set(name.clone(), Value::from_json(value));
            }
        }
        record
    }
}
