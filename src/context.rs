//! Context module: the record access contract filters are evaluated against.
//!
//! This module provides the Record trait and the Feature type, a map-backed record with an
//! optional identifier.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::types::Value;
use crate::FilterError;

/// Anything a filter can be evaluated against.
///
/// `get` returns `None` when the record has no such field, and `Some(Value::Null)` when the
/// field exists without a value. `accessor` is a second, derived lookup consulted after
/// `get` misses (computed attributes, the record id and the like).
pub trait Record {
    fn get(&self, name: &str) -> Option<Value>;

    fn accessor(&self, _name: &str) -> Option<Value> {
        None
    }

    fn id(&self) -> Option<&str> {
        None
    }

    /// The record as a single value, used by self references.
    fn to_value(&self) -> Value;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    id: Option<String>,
    values: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field.into(), value.into())
    }

    /// Sets a value after checking it against the field's declared type. Nulls are
    /// accepted for any declared field.
    pub fn set_checked(&mut self, field: &str, value: Value, schema: &Schema) -> Result<(), FilterError> {
        match schema.field_type(field) {
            Some(expected) => match value.field_type() {
                Some(actual) if actual != expected => Err(FilterError::Schema(format!(
                    "type mismatch for field '{}': expected {}, got {}",
                    field, expected, actual
                ))),
                _ => {
                    self.values.insert(field.to_string(), value);
                    Ok(())
                }
            },
            None => Err(FilterError::Schema(format!("no such field '{}'", field))),
        }
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// The first geometry-valued field.
    pub fn geometry(&self) -> Option<&Value> {
        self.values
            .values()
            .find(|v| matches!(v, Value::Geometry(_) | Value::Envelope(_)))
    }
}

impl Record for Feature {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn accessor(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.clone().map(Value::String),
            "geometry" => self.geometry().cloned(),
            _ => None,
        }
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }
}

impl Record for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl Record for BTreeMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        BTreeMap::get(self, name).cloned()
    }

    fn to_value(&self) -> Value {
        Value::Map(self.clone())
    }
}

/// The empty record: every lookup misses. Used to evaluate constant expressions.
impl Record for () {
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }

    fn to_value(&self) -> Value {
        Value::Null
    }
}
