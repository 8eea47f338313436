//! The relation loader contract.
//!
//! The planner never touches storage itself. It hands a [`RootRequest`] or a
//! [`BatchRequest`] to a [`RelationLoader`] and waits for the rows. One call is
//! one physical request against the store; loaders do not retry.
//!
//! Loaders return boxed futures so the trait stays object safe:
//!
//! ```rust,ignore
//! impl RelationLoader for MyLoader {
//!     fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
//!         Box::pin(async move {
//!             let rows = self.fetch(request.relationship, request.keys).await?;
//!             Ok(rows.into_iter().collect())
//!         })
//!     }
//!     // ...
//! }
//! ```

pub mod memory;

use smol_str::SmolStr;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use strata_schema::{EntityType, Relationship, RootField};

use crate::error::QueryResult;
use crate::filter::Filter;
use crate::value::{Key, Row, RowGroup};

pub use memory::{MemoryLoader, MemoryStore, StoredRow};

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An unkeyed fetch for a root listing.
#[derive(Debug, Clone, Copy)]
pub struct RootRequest<'a> {
    /// The root field.
    pub root: &'a RootField,
    /// Listed entity type.
    pub entity: &'a EntityType,
    /// Restriction on the listed rows.
    pub filter: &'a Filter,
    /// Field names to return; the primary key comes first.
    pub fields: &'a [SmolStr],
}

/// A keyed fetch of one relationship for many parents.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Relationship traversed.
    pub relationship: &'a Relationship,
    /// Entity type of the parents.
    pub source: &'a EntityType,
    /// Entity type of the returned rows.
    pub target: &'a EntityType,
    /// Join entity, for many-to-many relationships.
    pub join: Option<&'a EntityType>,
    /// Distinct parent keys.
    pub keys: &'a [Key],
    /// Restriction on the target rows.
    pub filter: &'a Filter,
    /// Target field names to return; the primary key comes first.
    pub fields: &'a [SmolStr],
}

impl BatchRequest<'_> {
    /// `Source.field` of the relationship.
    pub fn name(&self) -> String {
        self.relationship.qualified_name()
    }
}

/// Fetches rows for root listings and relationship batches.
pub trait RelationLoader: Send + Sync {
    /// Fetch the rows of a root listing, in store order.
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>>;

    /// Fetch the related rows of every parent key in one request.
    ///
    /// Rows of each parent come back in a deterministic order; parents
    /// without rows may be left out of the group.
    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>>;
}

impl<L: RelationLoader + ?Sized> RelationLoader for &L {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).load_root(request)
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        (**self).load(request)
    }
}

impl<L: RelationLoader + ?Sized> RelationLoader for Arc<L> {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).load_root(request)
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        (**self).load(request)
    }
}

impl<L: RelationLoader + ?Sized> RelationLoader for Box<L> {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).load_root(request)
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        (**self).load(request)
    }
}
