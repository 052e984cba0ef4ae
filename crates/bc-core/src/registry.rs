//! Capability registry.
//!
//! A flat, ordered mapping of capability name to value. Built once by the
//! derivation engine and read-mostly afterwards. [`Platform`] pairs it with
//! the boot-info store to provide the full lookup chain.

use std::collections::BTreeMap;

use bc_common::Value;
use serde::Serialize;

use crate::boxinfo::BoxInfo;

/// Capability name → derived value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, Value>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Truthiness of a capability; absent capabilities are false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    /// Integer value of a capability; absent or non-numeric capabilities are 0.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).and_then(Value::as_int).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.entries).unwrap_or(serde_json::Value::Null)
    }
}

/// The boot-info store together with the capability registry.
///
/// Owned by the caller and passed to consumers explicitly.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    pub boxinfo: BoxInfo,
    pub capabilities: CapabilityRegistry,
}

impl Platform {
    pub fn new(boxinfo: BoxInfo, capabilities: CapabilityRegistry) -> Self {
        Self {
            boxinfo,
            capabilities,
        }
    }

    /// Frozen layer → overlay → capabilities → `default`.
    pub fn get_item(&self, name: &str, default: Value) -> Value {
        self.boxinfo
            .get_item(name, Some(&self.capabilities), default)
    }

    /// Like [`Platform::get_item`] but `None` when the key is nowhere.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.boxinfo
            .get(name)
            .or_else(|| self.capabilities.get(name))
    }

    pub fn model(&self) -> String {
        self.boxinfo.model()
    }
}
