//! Resolution output: nested values, field errors and the cost snapshot.

use indexmap::IndexMap;
use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;

use crate::cost::QueryCost;
use crate::error::{ErrorCode, QueryError};
use crate::value::Value;

/// A value in the response tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum ResponseValue {
    /// Null: a missing to-one, a null scalar or a failed branch.
    #[default]
    Null,
    /// A scalar (or a primary key of an id-only selection).
    Scalar(Value),
    /// A to-many or many-to-many result, in loader order.
    List(Vec<ResponseValue>),
    /// An object keyed by response key, in selection order.
    Object(IndexMap<SmolStr, ResponseValue>),
}

impl ResponseValue {
    /// Check if this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get a member of an object.
    pub fn get(&self, key: &str) -> Option<&ResponseValue> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Get the items of a list.
    pub fn as_list(&self) -> Option<&[ResponseValue]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Get the members of an object.
    pub fn as_object(&self) -> Option<&IndexMap<SmolStr, ResponseValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Get the scalar.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Get a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    /// Get an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Value::as_i64)
    }

    /// Follow a dotted path of object keys and list indices (`users.0.username`).
    pub fn pointer(&self, path: &str) -> Option<&ResponseValue> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |value, segment| match value {
                Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                Self::Object(map) => map.get(segment),
                _ => None,
            })
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Scalar(v) => scalar_to_json(v),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ResponseValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Scalar(other),
        }
    }
}

fn scalar_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(scalar_to_json).collect()),
    }
}

/// One step of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// An object member.
    Key(SmolStr),
    /// A list position.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{}", k),
            Self::Index(i) => write!(f, "{}", i),
        }
    }
}

/// An error confined to one branch of the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Path of the field set to null.
    pub path: Vec<PathSegment>,
    /// Error code.
    pub code: ErrorCode,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Attach an error to a response path.
    pub fn new(path: Vec<PathSegment>, error: &QueryError) -> Self {
        Self {
            path,
            code: error.code,
            message: error.message.clone(),
        }
    }

    /// The path in dotted form (`users.0.likes`).
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (at {})", self.code, self.message, self.path_string())
    }
}

/// The result of one resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Response {
    /// Root results keyed by response key, in request order.
    pub data: IndexMap<SmolStr, ResponseValue>,
    /// Branch-level errors, in response order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    /// Fetch accounting for this resolution.
    #[serde(skip)]
    pub cost: QueryCost,
}

impl Response {
    /// Get a root result.
    pub fn get(&self, key: &str) -> Option<&ResponseValue> {
        self.data.get(key)
    }

    /// Follow a dotted path starting at the root keys (`users.0.following`).
    pub fn pointer(&self, path: &str) -> Option<&ResponseValue> {
        let (root, rest) = path.split_once('.').unwrap_or((path, ""));
        self.data.get(root).and_then(|value| value.pointer(rest))
    }

    /// Check if some branch failed.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The response envelope as JSON: `data`, plus `errors` when present.
    /// The cost is left out.
    pub fn to_json(&self) -> serde_json::Value {
        let data = self
            .data
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        let mut envelope = serde_json::Map::new();
        envelope.insert("data".to_string(), serde_json::Value::Object(data));
        if !self.errors.is_empty() {
            let errors = self
                .errors
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "message": e.message,
                        "code": e.code.code(),
                        "path": e.path.iter().map(|s| match s {
                            PathSegment::Key(k) => serde_json::Value::String(k.to_string()),
                            PathSegment::Index(i) => serde_json::Value::from(*i),
                        }).collect::<Vec<_>>(),
                    })
                })
                .collect();
            envelope.insert("errors".to_string(), serde_json::Value::Array(errors));
        }
        serde_json::Value::Object(envelope)
    }
}
