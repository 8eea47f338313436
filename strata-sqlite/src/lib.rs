//! SQLite relation loader for Strata.
//!
//! This crate serves Strata's root listings and batch requests from a SQLite
//! database, using `tokio-rusqlite` so queries run off the async runtime.
//!
//! # Features
//!
//! - One `SELECT` per root listing or batch request
//! - Projection of only the requested columns
//! - Declared filters pushed down as `=` / `IN (...)` predicates
//! - A statement counter for cross-checking the resolver's cost accounting
//! - In-memory and file-based databases, configured from `strata.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata_query::{Query, Resolver, Selection};
//! use strata_sqlite::{SqliteConfig, SqliteLoader};
//!
//! # async fn example(schema: Arc<strata_schema::Schema>) -> Result<(), Box<dyn std::error::Error>> {
//! let loader = SqliteLoader::open(&SqliteConfig::from_url("sqlite://./social.db")?).await?;
//! let resolver = Resolver::new(schema, loader);
//!
//! let query = Query::from(Selection::new("users").child(Selection::new("username")));
//! let response = resolver.resolve(&query).await?;
//! println!("{}", response.to_json());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
pub use loader::{SqliteLoader, Statement, batch_statement, root_statement};
