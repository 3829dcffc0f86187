//! Scalar values stored at the leaves of the document tree.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An immutable scalar. Primitives never merge; conflicting writes are
/// resolved at the containing object or array by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl Primitive {
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Null => "null",
            Primitive::Bool(_) => "bool",
            Primitive::Integer(_) => "integer",
            Primitive::Double(_) => "double",
            Primitive::String(_) => "string",
        }
    }

    /// The caller-visible JSON rendering.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Primitive::Null => JsonValue::Null,
            Primitive::Bool(b) => JsonValue::from(*b),
            Primitive::Integer(n) => JsonValue::from(*n),
            Primitive::Double(d) => JsonValue::from(*d),
            Primitive::String(s) => JsonValue::from(s.clone()),
        }
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::Integer(value)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::Integer(value as i64)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Double(value)
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::String(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::String(value)
    }
}
