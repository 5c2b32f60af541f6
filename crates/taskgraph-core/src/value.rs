//! `Value` — the tagged-sum type behind agent-defined property/state bags.
//!
//! `properties`, `state`, and evidence payloads are heterogeneous, agent
//! supplied data (spec.md §9 "Dynamic JSON properties"). Handlers read
//! specific keys through typed accessors below and never leak a raw
//! `serde_json::Value` upward past the store boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single dynamic value: null, bool, number, string, list, or map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::json!(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(l) => serde_json::Value::Array(l.into_iter().map(Into::into).collect()),
            Value::Map(m) => {
                serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A property/state bag: string keys to dynamic values, stored as a JSON
/// blob column and projected through this map in memory.
pub type PropertyMap = BTreeMap<String, Value>;

/// Merge `patch` into `base` per spec.md §4.2 node layer update rules:
/// keys present with a value replace; keys explicitly set to `Value::Null`
/// are deleted (the caller is responsible for distinguishing "absent" from
/// "present and null" before calling this — see `handlers::update`).
pub fn merge_properties(base: &mut PropertyMap, patch: PropertyMap) {
    for (k, v) in patch {
        if v.is_null() {
            base.remove(&k);
        } else {
            base.insert(k, v);
        }
    }
}
