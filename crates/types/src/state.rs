//! Mutable and shared state threaded through scenario execution.
//!
//! - [`Store`]: per-attempt key/value state written and read by steps
//! - [`World`]: run-wide read-only configuration, cheap to clone
//! - [`FlightRecorder`]: per-attempt side channel for cross-module capabilities

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Per-attempt mutable state. Values are JSON so assertions stay comparable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Store(JsonMap<String, Value>);

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copies every entry of `other` into this store, overwriting existing keys.
    pub fn extend(&mut self, other: &Store) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// The store as a JSON object, for path queries over its contents.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<JsonMap<String, Value>> for Store {
    fn from(map: JsonMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Store {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Run-wide read-only configuration shared by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct World(Arc<JsonMap<String, Value>>);

impl World {
    pub fn new(values: JsonMap<String, Value>) -> Self {
        Self(Arc::new(values))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<JsonMap<String, Value>> for World {
    fn from(map: JsonMap<String, Value>) -> Self {
        Self::new(map)
    }
}

/// Per-attempt capability flags and their settings.
///
/// Cooperating step modules use it to signal, for example, that an
/// authentication method became active together with its credentials. A fresh
/// recorder is allocated for every attempt, so state never leaks into a retry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlightRecorder {
    pub flags: HashMap<String, bool>,
    pub settings: HashMap<String, Value>,
}

impl FlightRecorder {
    /// Raises `flag` and records its settings.
    pub fn enable(&mut self, flag: impl Into<String>, settings: Value) {
        let flag = flag.into();
        self.flags.insert(flag.clone(), true);
        self.settings.insert(flag, settings);
    }

    pub fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    pub fn setting(&self, flag: &str) -> Option<&Value> {
        self.settings.get(flag)
    }
}
