//! Desired resource specifications
//!
//! A desired field is tri-state: an absent key means "leave it alone",
//! an explicit JSON `null` means "make it empty", anything else is a value.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State of a single desired field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// Caller did not mention the field
    Unset,
    /// Caller asked for the field to be cleared
    Empty,
    /// Caller supplied a value
    Value(&'a Value),
}

impl<'a> Field<'a> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    /// The value, or `None` for both unset and explicit-empty.
    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Comparable form: unset has none, explicit-empty compares as `null`.
    pub fn comparable(&self) -> Option<Value> {
        match *self {
            Field::Unset => None,
            Field::Empty => Some(Value::Null),
            Field::Value(v) => Some(v.clone()),
        }
    }
}

/// Caller-supplied desired configuration for one resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredSpec {
    fields: Map<String, Value>,
}

impl DesiredSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(CloudError::Validation(format!(
                "desired spec must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Set a field to a value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Mark a field as explicitly empty
    pub fn with_empty(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), Value::Null);
        self
    }

    pub fn field(&self, key: &str) -> Field<'_> {
        match self.fields.get(key) {
            None => Field::Unset,
            Some(Value::Null) => Field::Empty,
            Some(v) => Field::Value(v),
        }
    }

    /// Explicit non-empty value of a field
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.field(key).value()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// Whether the caller mentioned the field at all
    pub fn is_set(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Keys from `required` that do not carry a value
    pub fn missing<'k>(&self, required: &[&'k str]) -> Vec<&'k str> {
        required
            .iter()
            .copied()
            .filter(|key| self.value(key).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Renders a value as a path segment: strings verbatim, numbers as digits.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
