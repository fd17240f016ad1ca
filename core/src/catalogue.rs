#![deny(missing_docs)]

//! # Value Catalogue
//!
//! Values observed in response bodies, keyed by the normalized name of the
//! property they appeared under. Value providers draw from it to reuse
//! identifiers and other values the API has actually produced.
//!
//! The catalogue has a single owner (usually the [`crate::Context`]); writers
//! take `&mut self`, readers `&self`.

use crate::params::normalize_name;
use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};
use std::collections::HashSet;

/// Observed values for one normalized name.
#[derive(Debug, Clone, Default)]
struct Entry {
    strings: Vec<String>,
    numbers: Vec<Number>,
    string_set: HashSet<String>,
    number_set: HashSet<String>,
}

impl Entry {
    fn insert_string(&mut self, value: &str) -> bool {
        if self.string_set.insert(value.to_string()) {
            self.strings.push(value.to_string());
            true
        } else {
            false
        }
    }

    fn insert_number(&mut self, value: &Number) -> bool {
        if self.number_set.insert(value.to_string()) {
            self.numbers.push(value.clone());
            true
        } else {
            false
        }
    }
}

/// Single-owner store of observed string and number values.
#[derive(Debug, Clone, Default)]
pub struct ValueCatalogue {
    entries: IndexMap<String, Entry>,
}

impl ValueCatalogue {
    /// Creates an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every string and number in a response body.
    ///
    /// Values are filed under the nearest enclosing property name; array
    /// items inherit the name of the array. Returns how many new values were
    /// recorded.
    pub fn observe(&mut self, body: &JsonValue) -> usize {
        self.walk(None, body)
    }

    /// Records a single value under `name`.
    pub fn record(&mut self, name: &str, value: &JsonValue) -> bool {
        let entry = self.entries.entry(normalize_name(name)).or_default();
        match value {
            JsonValue::String(s) => entry.insert_string(s),
            JsonValue::Number(n) => entry.insert_number(n),
            _ => false,
        }
    }

    fn walk(&mut self, name: Option<&str>, value: &JsonValue) -> usize {
        match value {
            JsonValue::Null | JsonValue::Bool(_) => 0,
            JsonValue::String(_) | JsonValue::Number(_) => match name {
                Some(name) => usize::from(self.record(name, value)),
                None => 0,
            },
            JsonValue::Array(items) => items.iter().map(|item| self.walk(name, item)).sum(),
            JsonValue::Object(map) => map
                .iter()
                .map(|(key, item)| self.walk(Some(key), item))
                .sum(),
        }
    }

    /// Strings seen under a name (matched on the normalized form).
    pub fn strings(&self, name: &str) -> &[String] {
        self.entries
            .get(&normalize_name(name))
            .map(|e| e.strings.as_slice())
            .unwrap_or_default()
    }

    /// Numbers seen under a name (matched on the normalized form).
    pub fn numbers(&self, name: &str) -> &[Number] {
        self.entries
            .get(&normalize_name(name))
            .map(|e| e.numbers.as_slice())
            .unwrap_or_default()
    }

    /// All values seen under a name, numbers first.
    pub fn values(&self, name: &str) -> Vec<JsonValue> {
        self.numbers(name)
            .iter()
            .cloned()
            .map(JsonValue::Number)
            .chain(self.strings(name).iter().cloned().map(JsonValue::String))
            .collect()
    }

    /// Number of distinct names with at least one value.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_observe_files_values_under_property_names() {
        let mut catalogue = ValueCatalogue::new();
        let added = catalogue.observe(&json!({
            "petId": 7,
            "tags": ["a", "b", "a"],
            "owner": {"pet_id": 8, "active": true}
        }));
        assert_eq!(added, 4);
        assert_eq!(catalogue.numbers("pet_id").len(), 2);
        assert_eq!(catalogue.strings("tags"), &["a".to_string(), "b".to_string()]);
        assert!(catalogue.values("active").is_empty());
    }

    #[test]
    fn test_observing_twice_adds_nothing() {
        let mut catalogue = ValueCatalogue::new();
        let body = json!([{"id": "x"}, {"id": "y"}]);
        assert_eq!(catalogue.observe(&body), 2);
        assert_eq!(catalogue.observe(&body), 0);
        assert_eq!(catalogue.len(), 1);
    }
}
