//! Field comparison normalizers
//!
//! Both the desired and the observed value pass through the same
//! normalizer before they are compared, so cosmetic differences such as a
//! trailing dot on a DNS name never produce an update.

use serde_json::{Map, Value};

/// Pure transformation applied before equality comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Compare values as they are
    Verbatim,
    /// Drop one trailing `.`; `null` compares as an empty string
    TrimTrailingDot,
    /// Cut the value at the first occurrence of a suffix (anything after it,
    /// such as a trailing dot, goes too); `null` compares as an empty string
    StripSuffix(&'static str),
    /// `null` compares as `0`
    NullAsZero,
    /// `null` compares as an empty string
    NullAsEmpty,
    /// `null` compares as an empty object, as cleared tags read back
    NullAsEmptyObject,
    /// `null` compares as `false`
    NullAsFalse,
    /// Arrays compare without regard to order
    SortedList,
}

impl Normalizer {
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Normalizer::Verbatim => value.clone(),
            Normalizer::TrimTrailingDot => match value {
                Value::Null => Value::String(String::new()),
                Value::String(s) => {
                    Value::String(s.strip_suffix('.').unwrap_or(s.as_str()).to_string())
                }
                other => other.clone(),
            },
            Normalizer::StripSuffix(suffix) => match value {
                Value::Null => Value::String(String::new()),
                Value::String(s) => {
                    let head = s.find(*suffix).map(|at| &s[..at]).unwrap_or(s.as_str());
                    Value::String(head.to_string())
                }
                other => other.clone(),
            },
            Normalizer::NullAsZero => match value {
                Value::Null => Value::from(0),
                Value::String(s) => s
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| value.clone()),
                other => other.clone(),
            },
            Normalizer::NullAsEmpty => match value {
                Value::Null => Value::String(String::new()),
                other => other.clone(),
            },
            Normalizer::NullAsEmptyObject => match value {
                Value::Null => Value::Object(Map::new()),
                other => other.clone(),
            },
            Normalizer::NullAsFalse => match value {
                Value::Null => Value::Bool(false),
                other => other.clone(),
            },
            Normalizer::SortedList => match value {
                Value::Array(items) => {
                    let mut items = items.clone();
                    items.sort_by_key(|item| item.to_string());
                    Value::Array(items)
                }
                other => other.clone(),
            },
        }
    }

    /// Whether two values are equal after normalization
    pub fn equivalent(&self, left: &Value, right: &Value) -> bool {
        self.apply(left) == self.apply(right)
    }
}
