//! # Strata
//!
//! Batched, level-by-level resolution of nested selection trees against
//! relational stores.
//!
//! Strata provides:
//! - A schema registry of entity types, relationships (each with its inverse)
//!   and root listings
//! - Pre-flight validation of a selection tree before any fetch
//! - A breadth-first planner that loads each level with one batch request per
//!   (relationship, filter) pair, so the number of fetches depends on the shape
//!   of the query and not on the number of rows
//! - Pluggable loaders: in-memory, and SQLite on `tokio-rusqlite`
//! - Per-resolution fetch accounting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::builder()
//!         .register_type(
//!             EntityType::new("User", "users").field(ScalarField::new("username", ScalarType::String)),
//!         )
//!         .register_type(EntityType::new("Follow", "follows"))
//!         .register_relationship(
//!             "User",
//!             "following",
//!             RelationshipDef::many_to_many("User", JoinSpec::new("Follow", "follower_id", "followee_id"))
//!                 .inverse("followers"),
//!         )
//!         .register_root(RootField::new("users", "User"))
//!         .build()?;
//!
//!     let loader = SqliteLoader::open(&SqliteConfig::from_url("sqlite://./social.db")?).await?;
//!     let resolver = Resolver::new(Arc::new(schema), loader);
//!
//!     let query = Query::from_json(
//!         r#"[{"field": "users", "children": [
//!             {"field": "username"},
//!             {"field": "followers", "children": [{"field": "username"}]}
//!         ]}]"#,
//!     )?;
//!     let response = resolver.resolve(&query).await?;
//!     println!("{} using {}", response.to_json(), response.cost);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Entity types, relationships, root fields and configuration.
pub mod schema {
    pub use strata_schema::*;
}

/// Selection trees, planning, loaders and responses.
pub mod query {
    pub use strata_query::*;
}

/// SQLite relation loader.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use strata_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::query::prelude::*;
    pub use crate::query::QueryCost;
    pub use crate::schema::{
        ArgumentDef, EntityType, JoinSpec, RelationshipDef, RootField, ScalarField, ScalarType,
        Schema, StrataConfig,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::{SqliteConfig, SqliteLoader};
}

// Re-export key types at the crate root
pub use query::{QueryError, QueryResult, Resolver, Response};
pub use schema::{Schema, SchemaError, StrataConfig};
