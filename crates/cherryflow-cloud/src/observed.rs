//! Observed resource state

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider-assigned resource identifier
///
/// Cherry Servers uses integer IDs everywhere, but IDs travel through
/// URLs and caller input as strings, so both forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an ID from a JSON number or non-empty string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Canonical snapshot of a remote resource
///
/// Fields use the caller-facing vocabulary: nested API objects have been
/// flattened and renamed by the kind's normalizer before landing here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResource {
    pub kind: String,
    pub id: ResourceId,
    pub fields: Map<String, Value>,
}

impl ObservedResource {
    /// Build from normalized fields; `fields["id"]` must be present.
    pub fn new(kind: impl Into<String>, fields: Map<String, Value>) -> Result<Self> {
        let kind = kind.into();
        let id = fields
            .get("id")
            .and_then(ResourceId::from_value)
            .ok_or_else(|| CloudError::InvalidResponse {
                kind: kind.clone(),
                message: "resource has no id".to_string(),
            })?;

        Ok(Self { kind, id, fields })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn status(&self) -> Option<&str> {
        self.str("status")
    }

    /// Observed value for comparison; missing fields compare as `null`.
    pub fn comparable(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
