//! Per-resolution fetch accounting.
//!
//! Every resolution gets a fresh [`QueryCounter`]. The resolver wraps its
//! loader in a [`CountingLoader`], which records each call before it reaches
//! the store, so failed fetches count too. The [`QueryCost`] snapshot travels
//! next to the response data, never inside it.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::QueryResult;
use crate::loader::{BatchRequest, BoxFuture, RelationLoader, RootRequest};
use crate::value::{Row, RowGroup};

/// Snapshot of the work done by one resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryCost {
    /// Physical fetches dispatched to the loader.
    pub fetches: u64,
    /// Fetches for root listings.
    pub root_fetches: u64,
    /// Keyed batch fetches.
    pub batch_fetches: u64,
    /// Distinct parent keys sent across all batch fetches.
    pub keys_requested: u64,
    /// Rows returned by successful fetches.
    pub rows_loaded: u64,
    /// Levels that dispatched at least one fetch.
    pub levels: u64,
}

impl std::fmt::Display for QueryCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} fetches ({} root, {} batched) over {} levels, {} keys, {} rows",
            self.fetches,
            self.root_fetches,
            self.batch_fetches,
            self.levels,
            self.keys_requested,
            self.rows_loaded
        )
    }
}

/// Counters updated while a resolution runs.
#[derive(Debug, Default)]
pub struct QueryCounter {
    root_fetches: AtomicU64,
    batch_fetches: AtomicU64,
    keys_requested: AtomicU64,
    rows_loaded: AtomicU64,
    levels: AtomicU64,
}

impl QueryCounter {
    /// Create a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a root fetch.
    pub fn record_root(&self) {
        self.root_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch fetch for `keys` parents.
    pub fn record_batch(&self, keys: usize) {
        self.batch_fetches.fetch_add(1, Ordering::Relaxed);
        self.keys_requested.fetch_add(keys as u64, Ordering::Relaxed);
    }

    /// Record rows returned by a fetch.
    pub fn record_rows(&self, rows: usize) {
        self.rows_loaded.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Record a completed level.
    pub fn record_level(&self) {
        self.levels.fetch_add(1, Ordering::Relaxed);
    }

    /// Physical fetches so far.
    pub fn fetches(&self) -> u64 {
        self.root_fetches.load(Ordering::Relaxed) + self.batch_fetches.load(Ordering::Relaxed)
    }

    /// Take a snapshot.
    pub fn snapshot(&self) -> QueryCost {
        let root_fetches = self.root_fetches.load(Ordering::Relaxed);
        let batch_fetches = self.batch_fetches.load(Ordering::Relaxed);
        QueryCost {
            fetches: root_fetches + batch_fetches,
            root_fetches,
            batch_fetches,
            keys_requested: self.keys_requested.load(Ordering::Relaxed),
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            levels: self.levels.load(Ordering::Relaxed),
        }
    }
}

/// A loader that records every call in a [`QueryCounter`].
#[derive(Debug)]
pub struct CountingLoader<'a, L: ?Sized> {
    inner: &'a L,
    counter: &'a QueryCounter,
}

impl<'a, L: RelationLoader + ?Sized> CountingLoader<'a, L> {
    /// Wrap a loader.
    pub fn new(inner: &'a L, counter: &'a QueryCounter) -> Self {
        Self { inner, counter }
    }

    /// The counter being updated.
    pub fn counter(&self) -> &QueryCounter {
        self.counter
    }
}

impl<L: RelationLoader + ?Sized> RelationLoader for CountingLoader<'_, L> {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        self.counter.record_root();
        Box::pin(async move {
            let rows = self.inner.load_root(request).await?;
            self.counter.record_rows(rows.len());
            Ok(rows)
        })
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        self.counter.record_batch(request.keys.len());
        Box::pin(async move {
            let group = self.inner.load(request).await?;
            self.counter.record_rows(group.row_count());
            Ok(group)
        })
    }
}
