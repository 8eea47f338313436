//! Scalar values, primary keys and loaded rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

use strata_schema::ScalarType;

/// A scalar value, or a list of them in argument position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(SmolStr),
    /// List of values (arguments only).
    List(Vec<Value>),
}

impl Value {
    /// Check if this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's kind, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::List(_) => "List",
        }
    }

    /// Convert to the representation used for a field of `scalar_type`.
    ///
    /// Integers widen to floats; every other mismatch yields `None`.
    pub fn coerce_to(&self, scalar_type: ScalarType) -> Option<Value> {
        match (scalar_type, self) {
            (ScalarType::Int, Self::Int(_))
            | (ScalarType::Float, Self::Float(_))
            | (ScalarType::String, Self::String(_))
            | (ScalarType::Boolean, Self::Bool(_)) => Some(self.clone()),
            (ScalarType::Float, Self::Int(i)) => Some(Self::Float(*i as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{:?}", s.as_str()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(SmolStr::new(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(SmolStr::from(v))
    }
}

impl From<SmolStr> for Value {
    fn from(v: SmolStr) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(i) => Self::Int(i),
            Key::String(s) => Self::String(s),
        }
    }
}

/// An opaque primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Integer key.
    Int(i64),
    /// String key.
    String(SmolStr),
}

impl Key {
    /// Interpret a scalar value as a key. Floats, booleans and nulls are not keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(Self::Int(*i)),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// The key as a scalar value.
    pub fn to_value(&self) -> Value {
        self.clone().into()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self::String(SmolStr::new(v))
    }
}

/// A loaded row of a target entity type.
///
/// `values` is keyed by field name and holds at least the requested fields,
/// including the primary key field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Primary key of the row.
    pub key: Key,
    /// Field values by field name.
    pub values: IndexMap<SmolStr, Value>,
}

impl Row {
    /// Create a row with no field values.
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            values: IndexMap::new(),
        }
    }

    /// Add a field value.
    pub fn with(mut self, field: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Keep only the listed fields.
    pub fn project(mut self, fields: &[SmolStr]) -> Self {
        self.values.retain(|name, _| fields.contains(name));
        self
    }
}

/// Rows returned by one batch request, grouped by parent key.
///
/// Parents without related rows may be absent; they read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowGroup {
    groups: IndexMap<Key, Vec<Row>>,
}

impl RowGroup {
    /// Create an empty row group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to the rows of `parent`.
    pub fn push(&mut self, parent: Key, row: Row) {
        self.groups.entry(parent).or_default().push(row);
    }

    /// Rows of `parent`, in loader order.
    pub fn get(&self, parent: &Key) -> &[Row] {
        self.groups.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of parents with at least one row.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no rows were loaded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of rows across all parents.
    pub fn row_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Iterate over parents and their rows.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &[Row])> {
        self.groups.iter().map(|(k, rows)| (k, rows.as_slice()))
    }
}

impl FromIterator<(Key, Row)> for RowGroup {
    fn from_iter<I: IntoIterator<Item = (Key, Row)>>(iter: I) -> Self {
        let mut group = Self::new();
        for (parent, row) in iter {
            group.push(parent, row);
        }
        group
    }
}
