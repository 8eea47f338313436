//! # strata-query
//!
//! Batched, level-by-level resolution of nested selection trees.
//!
//! This crate provides:
//! - Selection trees (`Selection`, `Query`) built fluently or parsed from JSON
//! - Pre-flight binding against a `strata_schema::Schema`: unknown fields,
//!   unknown arguments and over-deep trees are rejected before any fetch
//! - A breadth-first planner that sends one batch request per
//!   (relationship, filter) pair per level
//! - The `RelationLoader` contract and an in-memory loader
//! - Response assembly with branch-local errors
//! - Per-resolution fetch accounting (`QueryCost`)
//!
//! ## Resolving a query
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_query::{MemoryLoader, MemoryStore, Query, Resolver, Selection, Value};
//! use strata_schema::{EntityType, RelationshipDef, RootField, ScalarField, ScalarType, Schema};
//!
//! let schema = Schema::builder()
//!     .register_type(EntityType::new("User", "users").field(ScalarField::new("name", ScalarType::String)))
//!     .register_type(EntityType::new("Post", "posts").field(ScalarField::new("title", ScalarType::String)))
//!     .register_relationship("Post", "author", RelationshipDef::to_one("User", "author_id").inverse("posts"))
//!     .register_root(RootField::new("users", "User"))
//!     .build()
//!     .unwrap();
//!
//! let store = MemoryStore::new()
//!     .with_row("users", [("id", Value::from(1)), ("name", Value::from("ada"))])
//!     .with_row("posts", [("id", Value::from(1)), ("title", Value::from("hello")), ("author_id", Value::from(1))]);
//!
//! let resolver = Resolver::new(Arc::new(schema), MemoryLoader::new(store));
//! let query = Query::from(
//!     Selection::new("users")
//!         .child(Selection::new("name"))
//!         .child(Selection::new("posts").child(Selection::new("title"))),
//! );
//!
//! let response = tokio::runtime::Builder::new_current_thread()
//!     .enable_all()
//!     .build()
//!     .unwrap()
//!     .block_on(resolver.resolve(&query))
//!     .unwrap();
//! assert_eq!(response.pointer("users.0.posts.0.title").and_then(|v| v.as_str()), Some("hello"));
//! assert_eq!(response.cost.fetches, 2);
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use strata_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_field("User", "email");
//! assert_eq!(err.code, ErrorCode::UnknownField);
//! assert!(err.is_validation_error());
//! ```

mod assembler;
pub mod bind;
pub mod cost;
pub mod error;
pub mod filter;
pub mod loader;
#[macro_use]
pub mod logging;
mod planner;
pub mod resolver;
pub mod response;
pub mod selection;
pub mod value;

#[cfg(test)]
mod testing;

pub use bind::{Binder, BoundField, BoundQuery, BoundRelation, BoundRoot, BoundSelection};
pub use cost::{CountingLoader, QueryCost, QueryCounter};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use filter::{Condition, Filter};
pub use loader::{
    BatchRequest, BoxFuture, MemoryLoader, MemoryStore, RelationLoader, RootRequest, StoredRow,
};
pub use resolver::{CancelToken, Resolver, ResolverOptions};
pub use response::{FieldError, PathSegment, Response, ResponseValue};
pub use selection::{Arguments, Query, Selection};
pub use value::{Key, Row, RowGroup, Value};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, init_from_config, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCode, QueryError, QueryResult};
    pub use crate::loader::{MemoryLoader, MemoryStore, RelationLoader};
    pub use crate::resolver::{CancelToken, Resolver, ResolverOptions};
    pub use crate::response::{Response, ResponseValue};
    pub use crate::selection::{Query, Selection};
    pub use crate::value::{Key, Row, Value};
}
