//! # strata-schema
//!
//! Entity and relationship registry for Strata.
//!
//! This crate provides:
//! - Entity types with a primary key and typed scalar fields
//! - Relationships (to-one, to-many, many-to-many through a join entity),
//!   each registered together with its inverse
//! - Root listings and the filter arguments they accept
//! - Configuration parser for `strata.toml` files
//!
//! ## Example
//!
//! ```rust
//! use strata_schema::{
//!     ArgumentDef, EntityType, JoinSpec, RelationshipDef, Resolved, RootField, ScalarField,
//!     ScalarType, Schema,
//! };
//!
//! let schema = Schema::builder()
//!     .register_type(
//!         EntityType::new("User", "users").field(ScalarField::new("username", ScalarType::String)),
//!     )
//!     .register_type(EntityType::new("Follow", "follows"))
//!     .register_relationship(
//!         "User",
//!         "following",
//!         RelationshipDef::many_to_many("User", JoinSpec::new("Follow", "follower_id", "followee_id"))
//!             .inverse("followers"),
//!     )
//!     .register_root(RootField::new("users", "User").argument(ArgumentDef::any_of("usernames", "username")))
//!     .build()
//!     .unwrap();
//!
//! assert!(matches!(schema.resolve("User", "followers"), Resolved::Relationship(_)));
//! assert!(matches!(schema.resolve("User", "email"), Resolved::NotFound));
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod registry;
pub mod relation;

pub use config::{DatabaseConfig, DebugConfig, ResolverConfig, StrataConfig};
pub use entity::{EntityType, ScalarField, ScalarType};
pub use error::{SchemaError, SchemaResult};
pub use registry::{Resolved, RootField, Schema, SchemaBuilder};
pub use relation::{
    ArgumentDef, ArgumentOp, Cardinality, JoinSpec, Link, Relationship, RelationshipDef,
    RelationshipId,
};
