//! The resolver entry point.
//!
//! [`Resolver`] ties the pieces together: it binds a [`Query`] against the
//! schema, runs the planner over a [`CountingLoader`] with a fresh
//! [`QueryCounter`], and assembles the [`Response`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata_query::{MemoryLoader, MemoryStore, Query, Resolver, Selection};
//! # async fn example(schema: Arc<strata_schema::Schema>) -> strata_query::QueryResult<()> {
//! let resolver = Resolver::new(schema, MemoryLoader::new(MemoryStore::new()));
//! let response = resolver
//!     .resolve(&Query::from(Selection::new("users").child(Selection::new("username"))))
//!     .await?;
//! println!("{} ({})", response.to_json(), response.cost);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument};

use strata_schema::{Schema, StrataConfig};

use crate::assembler::assemble;
use crate::bind::{Binder, BoundQuery};
use crate::cost::{CountingLoader, QueryCounter};
use crate::error::QueryResult;
use crate::loader::RelationLoader;
use crate::planner::Planner;
use crate::response::Response;
use crate::selection::Query;

/// Resolver limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Deepest accepted selection nesting; roots count as 1.
    pub max_depth: usize,
    /// Batch requests of one level in flight at the same time.
    pub max_concurrency: usize,
    /// Log every batch request at debug level.
    pub log_batches: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: 12,
            max_concurrency: 8,
            log_batches: false,
        }
    }
}

impl ResolverOptions {
    /// Read the `[resolver]` and `[debug]` sections of `strata.toml`.
    pub fn from_config(config: &StrataConfig) -> Self {
        Self {
            max_depth: config.resolver.max_depth,
            max_concurrency: config.resolver.max_concurrency.max(1),
            log_batches: config.debug.log_batches,
        }
    }

    /// Set the depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the per-level concurrency bound (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Log every batch request.
    pub fn with_batch_logging(mut self, enabled: bool) -> Self {
        self.log_batches = enabled;
        self
    }
}

/// Cancels a resolution at its next level boundary.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resolves queries against one schema and one loader.
///
/// The resolver holds no per-request state; share it behind an [`Arc`] and
/// call [`resolve`](Self::resolve) from as many tasks as needed.
#[derive(Debug)]
pub struct Resolver<L> {
    schema: Arc<Schema>,
    loader: L,
    options: ResolverOptions,
}

impl<L: RelationLoader> Resolver<L> {
    /// Create a resolver with default options.
    pub fn new(schema: Arc<Schema>, loader: L) -> Self {
        Self {
            schema,
            loader,
            options: ResolverOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// The options.
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Run the pre-flight checks without fetching anything.
    pub fn validate(&self, query: &Query) -> QueryResult<()> {
        self.bind(query).map(|_| ())
    }

    /// Resolve a query.
    pub async fn resolve(&self, query: &Query) -> QueryResult<Response> {
        self.resolve_with_cancel(query, &CancelToken::new()).await
    }

    /// Resolve a query, stopping at the next level boundary once `cancel` fires.
    ///
    /// A cancelled resolution returns `Cancelled`; nothing loaded so far is
    /// assembled.
    #[instrument(skip_all, fields(roots = query.selections.len()))]
    pub async fn resolve_with_cancel(
        &self,
        query: &Query,
        cancel: &CancelToken,
    ) -> QueryResult<Response> {
        let bound = self.bind(query)?;
        debug!(depth = bound.depth, "Query bound");

        let counter = QueryCounter::new();
        let loader = CountingLoader::new(&self.loader, &counter);
        let execution = Planner::new(&loader, &counter, &self.options, cancel)
            .execute(&bound)
            .await?;

        let mut response = assemble(&bound, &execution);
        response.cost = counter.snapshot();
        info!(
            fetches = response.cost.fetches,
            levels = response.cost.levels,
            errors = response.errors.len(),
            "Resolution complete"
        );
        Ok(response)
    }

    fn bind(&self, query: &Query) -> QueryResult<BoundQuery<'_>> {
        Binder::new(&self.schema, self.options.max_depth).bind(query)
    }
}
