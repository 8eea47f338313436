//! The selection tree handed to the resolver.
//!
//! A [`Query`] is a list of root selections. Each [`Selection`] names a field,
//! optionally an alias and arguments, and the child selections requested on
//! the related entity type. Fragments are expected to be expanded already.
//!
//! ```rust
//! use strata_query::{Query, Selection};
//!
//! let query = Query::new().select(
//!     Selection::new("users")
//!         .arg("usernames", vec!["user1"])
//!         .child(Selection::new("username"))
//!         .child(Selection::new("following").child(Selection::new("username"))),
//! );
//!
//! assert_eq!(query.selections[0].depth(), 2);
//! ```
//!
//! The same tree can be read from JSON:
//!
//! ```rust
//! use strata_query::Query;
//!
//! let query = Query::from_json(r#"[
//!     {"field": "users", "arguments": {"usernames": ["user1"]},
//!      "children": [{"field": "username"}, {"alias": "fans", "field": "followers"}]}
//! ]"#).unwrap();
//!
//! assert_eq!(query.selections[0].children[1].response_key(), "fans");
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// Argument values by argument name.
pub type Arguments = IndexMap<SmolStr, Value>;

/// One node of a selection tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    /// Response key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<SmolStr>,
    /// Field name on the parent entity type (or root field name).
    pub field: SmolStr,
    /// Filter arguments.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub arguments: Arguments,
    /// Sub-selections; empty for scalars and id-only relationships.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Selection>,
}

impl Selection {
    /// Select a field.
    pub fn new(field: impl Into<SmolStr>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    /// Set the response key.
    pub fn alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an argument.
    pub fn arg(mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Add a child selection.
    pub fn child(mut self, child: Selection) -> Self {
        self.children.push(child);
        self
    }

    /// Add several child selections.
    pub fn children(mut self, children: impl IntoIterator<Item = Selection>) -> Self {
        self.children.extend(children);
        self
    }

    /// Select several scalar fields by name.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.children.extend(names.into_iter().map(Selection::new));
        self
    }

    /// Key under which the result appears: the alias, or the field name.
    pub fn response_key(&self) -> &SmolStr {
        self.alias.as_ref().unwrap_or(&self.field)
    }

    /// Nesting depth: 1 for a leaf, plus one per level of children.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Selection::depth).max().unwrap_or(0)
    }
}

/// A pre-parsed query: the root selections, in request order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    /// Root selections.
    pub selections: Vec<Selection>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root selection.
    pub fn select(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Read a query from a JSON array of selections.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            QueryError::invalid_selection("query", format!("malformed selection tree: {}", e))
                .with_source(e)
        })
    }
}

impl From<Selection> for Query {
    fn from(selection: Selection) -> Self {
        Self::new().select(selection)
    }
}

impl FromIterator<Selection> for Query {
    fn from_iter<I: IntoIterator<Item = Selection>>(iter: I) -> Self {
        Self {
            selections: iter.into_iter().collect(),
        }
    }
}
