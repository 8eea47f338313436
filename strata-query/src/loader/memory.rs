//! In-memory relation loader.
//!
//! [`MemoryStore`] holds tables of column → value rows, keyed by table name.
//! [`MemoryLoader`] serves root and batch requests from it with the same
//! ordering rules as the SQL loader: listings and to-many rows in table order,
//! many-to-many rows in join table order. Failures can be injected per root
//! field or relationship to exercise partial results.

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

use strata_schema::{EntityType, Link};

use super::{BatchRequest, BoxFuture, RelationLoader, RootRequest};
use crate::error::{QueryError, QueryResult};
use crate::value::{Key, Row, RowGroup, Value};

/// A stored row: column name → value.
pub type StoredRow = IndexMap<SmolStr, Value>;

/// Tables of rows, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: IndexMap<SmolStr, Vec<StoredRow>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to `table`.
    pub fn insert<'c>(&mut self, table: &str, columns: impl IntoIterator<Item = (&'c str, Value)>) {
        let row = columns
            .into_iter()
            .map(|(column, value)| (SmolStr::new(column), value))
            .collect();
        self.tables.entry(SmolStr::new(table)).or_default().push(row);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_row<'c>(
        mut self,
        table: &str,
        columns: impl IntoIterator<Item = (&'c str, Value)>,
    ) -> Self {
        self.insert(table, columns);
        self
    }

    /// Rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> &[StoredRow] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove every row of `table`.
    pub fn clear(&mut self, table: &str) {
        self.tables.shift_remove(table);
    }
}

/// Serves requests from a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryLoader {
    store: RwLock<MemoryStore>,
    failing: RwLock<HashSet<SmolStr>>,
    latency: Option<Duration>,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryLoader {
    /// Create a loader over a store.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store: RwLock::new(store),
            failing: RwLock::new(HashSet::new()),
            latency: None,
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every call, so concurrent dispatch becomes observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Wrap in an [`Arc`] for sharing between resolvers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Make requests for a root field (`users`) or relationship
    /// (`User.followers`) fail with `LoaderUnavailable`.
    pub fn fail(&self, name: impl Into<SmolStr>) {
        self.failing.write().insert(name.into());
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, name: &str) {
        self.failing.write().remove(name);
    }

    /// Run a closure with mutable access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut MemoryStore) -> R) -> R {
        f(&mut self.store.write())
    }

    /// Calls served (or failed) since creation.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    async fn enter(&self, name: &str) -> QueryResult<InFlight<'_>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.read().contains(name) {
            return Err(QueryError::loader_unavailable(name, "store unreachable"));
        }
        Ok(guard)
    }

    fn root_rows(&self, request: &RootRequest<'_>) -> QueryResult<Vec<Row>> {
        let store = self.store.read();
        let mut rows = Vec::new();
        for stored in store.rows(&request.entity.table) {
            let row = to_row(request.entity, stored)?;
            if request.filter.matches(&row) {
                rows.push(row.project(request.fields));
            }
        }
        Ok(rows)
    }

    fn batch_rows(&self, request: &BatchRequest<'_>) -> QueryResult<RowGroup> {
        let store = self.store.read();
        let wanted: HashSet<&Key> = request.keys.iter().collect();
        let target = request.target;
        let mut group = RowGroup::new();

        let accept = |group: &mut RowGroup, parent: Key, row: Row| {
            if request.filter.matches(&row) {
                group.push(parent, row.project(request.fields));
            }
        };

        match &request.relationship.link {
            Link::ForeignKey { column } => {
                let targets = index_by_key(target, store.rows(&target.table))?;
                let sources = index_by_key(request.source, store.rows(&request.source.table))?;
                for parent in request.keys {
                    let Some(source) = sources.get(parent) else {
                        continue;
                    };
                    let Some(fk) = source.get(column.as_str()).and_then(Key::from_value) else {
                        continue;
                    };
                    if let Some(stored) = targets.get(&fk) {
                        accept(&mut group, parent.clone(), to_row(target, stored)?);
                    }
                }
            }
            Link::Reverse { column } => {
                for stored in store.rows(&target.table) {
                    let Some(parent) = stored.get(column.as_str()).and_then(Key::from_value) else {
                        continue;
                    };
                    if wanted.contains(&parent) {
                        accept(&mut group, parent, to_row(target, stored)?);
                    }
                }
            }
            Link::Join(via) => {
                let join = request.join.ok_or_else(|| {
                    QueryError::internal(format!("`{}` has no join entity", request.name()))
                })?;
                let targets = index_by_key(target, store.rows(&target.table))?;
                for link in store.rows(&join.table) {
                    let parent = link.get(via.source_column.as_str()).and_then(Key::from_value);
                    let child = link.get(via.target_column.as_str()).and_then(Key::from_value);
                    let (Some(parent), Some(child)) = (parent, child) else {
                        continue;
                    };
                    if !wanted.contains(&parent) {
                        continue;
                    }
                    if let Some(stored) = targets.get(&child) {
                        accept(&mut group, parent, to_row(target, stored)?);
                    }
                }
            }
        }

        Ok(group)
    }
}

impl RelationLoader for MemoryLoader {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        Box::pin(async move {
            let _guard = self.enter(&request.root.name).await?;
            let rows = self.root_rows(&request)?;
            trace!(root = %request.root.name, rows = rows.len(), "Memory root load");
            Ok(rows)
        })
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        Box::pin(async move {
            let _guard = self.enter(&request.name()).await?;
            let group = self.batch_rows(&request)?;
            trace!(
                relationship = %request.name(),
                keys = request.keys.len(),
                rows = group.row_count(),
                "Memory batch load"
            );
            Ok(group)
        })
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Build a row carrying every field of `entity`. Missing columns read as null.
fn to_row(entity: &EntityType, stored: &StoredRow) -> QueryResult<Row> {
    let key = stored
        .get(entity.key_column())
        .and_then(Key::from_value)
        .ok_or_else(|| {
            QueryError::invalid_row(format!(
                "row of `{}` has no usable primary key `{}`",
                entity.table,
                entity.key_column()
            ))
            .with_entity(entity.name.as_str())
        })?;

    let values = entity
        .fields
        .values()
        .map(|field| {
            let value = stored.get(field.column.as_str()).cloned().unwrap_or_default();
            (field.name.clone(), value)
        })
        .collect();

    Ok(Row { key, values })
}

fn index_by_key<'r>(
    entity: &EntityType,
    rows: &'r [StoredRow],
) -> QueryResult<HashMap<Key, &'r StoredRow>> {
    let column = entity.key_column();
    rows.iter()
        .map(|row| {
            row.get(column)
                .and_then(Key::from_value)
                .map(|key| (key, row))
                .ok_or_else(|| {
                    QueryError::invalid_row(format!(
                        "row of `{}` has no usable primary key `{}`",
                        entity.table, column
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::filter::{Condition, Filter};
    use crate::testing::{social_schema, social_store};
    use pretty_assertions::assert_eq;
    use strata_schema::Schema;

    fn batch<'a>(
        schema: &'a Schema,
        entity: &str,
        field: &str,
        keys: &'a [Key],
        filter: &'a Filter,
        fields: &'a [SmolStr],
    ) -> BatchRequest<'a> {
        let relationship = schema.relationship_by_field(entity, field).unwrap();
        let join = match &relationship.link {
            Link::Join(via) => schema.entity(&via.entity),
            _ => None,
        };
        BatchRequest {
            relationship,
            source: schema.entity(&relationship.source).unwrap(),
            target: schema.entity(&relationship.target).unwrap(),
            join,
            keys,
            filter,
            fields,
        }
    }

    fn usernames(rows: &[Row]) -> Vec<&str> {
        rows.iter()
            .filter_map(|r| r.get("username").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_root_listing_is_filtered_and_projected() {
        let schema = social_schema();
        let loader = MemoryLoader::new(social_store());
        let filter = Filter::none().and(Condition::AnyOf {
            field: "username".into(),
            values: vec!["user3".into(), "user1".into()],
        });
        let fields = [SmolStr::new("id")];

        let rows = loader
            .load_root(RootRequest {
                root: schema.root("users").unwrap(),
                entity: schema.entity("User").unwrap(),
                filter: &filter,
                fields: &fields,
            })
            .await
            .unwrap();

        let keys: Vec<_> = rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![Key::Int(1), Key::Int(3)]);
        assert!(rows[0].get("username").is_none());
    }

    #[tokio::test]
    async fn test_many_to_many_follows_join_order() {
        let schema = social_schema();
        let loader = MemoryLoader::new(social_store());
        let keys = [Key::Int(2), Key::Int(3), Key::Int(4)];
        let filter = Filter::none();
        let fields = [SmolStr::new("id"), SmolStr::new("username")];

        let group = loader
            .load(batch(&schema, "User", "followers", &keys, &filter, &fields))
            .await
            .unwrap();

        assert_eq!(usernames(group.get(&Key::Int(2))), vec!["user1", "user3", "user6", "user7"]);
        assert_eq!(usernames(group.get(&Key::Int(3))), vec!["user1", "user4", "user6"]);
        assert_eq!(usernames(group.get(&Key::Int(4))), vec!["user1"]);
    }

    #[tokio::test]
    async fn test_to_one_and_to_many() {
        let schema = social_schema();
        let loader = MemoryLoader::new(social_store());
        let filter = Filter::none();
        let fields = [SmolStr::new("id"), SmolStr::new("username")];

        let posts = [Key::Int(1), Key::Int(3)];
        let authors = loader
            .load(batch(&schema, "Post", "author", &posts, &filter, &fields))
            .await
            .unwrap();
        assert_eq!(usernames(authors.get(&Key::Int(1))), vec!["user2"]);
        assert_eq!(usernames(authors.get(&Key::Int(3))), vec!["user6"]);

        let users = [Key::Int(2), Key::Int(5)];
        let post_fields = [SmolStr::new("id")];
        let written = loader
            .load(batch(&schema, "User", "posts", &users, &filter, &post_fields))
            .await
            .unwrap();
        assert_eq!(written.get(&Key::Int(2)).len(), 1);
        assert!(written.get(&Key::Int(5)).is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let schema = social_schema();
        let loader = MemoryLoader::new(social_store());
        loader.fail("User.likes");
        let keys = [Key::Int(1)];
        let filter = Filter::none();
        let fields = [SmolStr::new("id")];

        let err = loader
            .load(batch(&schema, "User", "likes", &keys, &filter, &fields))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::LoaderUnavailable);

        loader.recover("User.likes");
        let group = loader
            .load(batch(&schema, "User", "likes", &keys, &filter, &fields))
            .await
            .unwrap();
        assert_eq!(group.row_count(), 3);
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn test_missing_primary_key_is_invalid() {
        let schema = social_schema();
        let store = MemoryStore::new().with_row("users", [("username", Value::from("ghost"))]);
        let err = to_row(schema.entity("User").unwrap(), &store.rows("users")[0]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRow);
    }
}
