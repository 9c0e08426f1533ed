//! The generic record exchanged between plugins.
//!
//! A [`Record`] is an insertion-ordered map from field name to a JSON scalar.
//! It is the only data shape that crosses a plugin boundary, so nothing in it
//! may require a concrete type from the producing plugin: identifiers, enum
//! variants and dates travel as their canonical strings.
//!
//! Arrays and objects are never stored. Inserting one replaces it with `null`
//! and logs a warning, the same way the mapper drops collection fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

/// Ordered string-keyed map of scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Conventional key of the entity identifier.
    pub const ID_KEY: &'static str = "uuid";

    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates an empty record with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Map::with_capacity(capacity))
    }

    /// Builds a record from a JSON object, dropping nested values.
    pub fn from_map(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }

    /// Inserts a value, replacing any previous value under `key`.
    ///
    /// Nested arrays and objects are stored as `null`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = scalar(&key, value.into());
        self.0.insert(key, value)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Parses a field holding the canonical string form of an identifier.
    pub fn get_uuid(&self, key: &str) -> Option<Uuid> {
        self.get_str(key)
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// The value of [`ID_KEY`](Self::ID_KEY) as an identifier.
    pub fn id(&self) -> Option<Uuid> {
        self.get_uuid(Self::ID_KEY)
    }

    /// Textual form of a field, `"null"` when absent or null.
    ///
    /// Used for loose client-side comparisons where the field type is not
    /// known to the caller.
    pub fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => "null".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record into its JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn scalar(key: &str, value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => {
            warn!(field = %key, "Nested value dropped from record");
            Value::Null
        }
        other => other,
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Record::from_map)
    }
}
