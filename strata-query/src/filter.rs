//! Canonical filters attached to root fetches and batch requests.
//!
//! A [`Filter`] is built from a selection's arguments in the declaration order
//! of the matching [`ArgumentDef`](strata_schema::ArgumentDef)s, so two
//! selections passing the same arguments in a different order produce equal
//! filters and share one batch request.

use smallvec::SmallVec;
use smol_str::SmolStr;
use std::fmt;

use crate::value::{Row, Value};

/// A single restriction on a scalar field of the target entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field = value`.
    Equals {
        /// Field name on the target entity.
        field: SmolStr,
        /// Value compared against.
        value: Value,
    },
    /// `field IN (values)`; never empty.
    AnyOf {
        /// Field name on the target entity.
        field: SmolStr,
        /// Accepted values.
        values: Vec<Value>,
    },
}

impl Condition {
    /// Field the condition applies to.
    pub fn field(&self) -> &SmolStr {
        match self {
            Self::Equals { field, .. } | Self::AnyOf { field, .. } => field,
        }
    }

    /// Values bound as parameters, in order.
    pub fn values(&self) -> &[Value] {
        match self {
            Self::Equals { value, .. } => std::slice::from_ref(value),
            Self::AnyOf { values, .. } => values,
        }
    }

    /// Check a field value against the condition.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Equals { value: expected, .. } => loose_eq(expected, value),
            Self::AnyOf { values, .. } => values.iter().any(|v| loose_eq(v, value)),
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(_), Value::Int(_)) | (Value::Int(_), Value::Float(_)) => {
            a.as_f64() == b.as_f64()
        }
        _ => a == b,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { field, value } => write!(f, "{} = {}", field, value),
            Self::AnyOf { field, values } => {
                write!(f, "{} IN (", field)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Conjunction of conditions. The empty filter matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: SmallVec<[Condition; 2]>,
}

impl Filter {
    /// The filter that matches everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a condition.
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a condition in place.
    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Check if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions in canonical order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Check a row. A field missing from the row fails its condition.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|c| row.get(c.field()).is_some_and(|v| c.matches(v)))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "*");
        }
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
