//! SQLite relation loader.
//!
//! Every root listing and every batch request becomes exactly one `SELECT`.
//! Batch statements select the parent key as their first column and restrict
//! it with `IN (...)`:
//!
//! | Link          | Parent column          | Row order             |
//! |---------------|------------------------|-----------------------|
//! | foreign key   | source primary key     | source primary key    |
//! | reverse       | target foreign key     | target primary key    |
//! | join entity   | join source column     | join row primary key  |
//!
//! Filters are ANDed onto the target columns and only the projected fields
//! are selected.

use rusqlite::types::Value as SqlValue;
use smol_str::SmolStr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use strata_query::{
    BatchRequest, BoxFuture, Condition, Filter, Key, QueryResult, RelationLoader, RootRequest, Row,
    RowGroup, Value,
};
use strata_schema::{EntityType, Link};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::{from_sql, key_to_sql, to_sql};

/// A SQL statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Parameter values, in placeholder order.
    pub params: Vec<SqlValue>,
}

/// Serves root and batch requests from a SQLite database.
///
/// Every parent key of a batch is bound as its own parameter of a single
/// `IN (...)` list, and filter values add more. SQLite rejects statements
/// with more bound parameters than its `SQLITE_MAX_VARIABLE_NUMBER` limit
/// (32766 for the bundled library), so a level whose deduplicated parent keys
/// plus filter values exceed it fails with `LoaderUnavailable` instead of
/// being split into several statements.
#[derive(Debug, Clone)]
pub struct SqliteLoader {
    conn: Connection,
    statements: Arc<AtomicU64>,
}

impl SqliteLoader {
    /// Open a database and apply the configured pragmas.
    pub async fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await,
            DatabasePath::File(path) => Connection::open(path.as_path()).await,
        }
        .map_err(|e| SqliteError::connection(format!("{}: {}", config.path_str(), e)))?;

        let loader = Self::from_connection(conn);
        let init = config.init_sql();
        if !init.is_empty() {
            loader.execute_batch(&init).await?;
        }
        debug!(path = config.path_str(), "SQLite loader opened");
        Ok(loader)
    }

    /// Open a private in-memory database with default settings.
    pub async fn open_in_memory() -> SqliteResult<Self> {
        Self::open(&SqliteConfig::memory()).await
    }

    /// Open a database file with default settings.
    pub async fn open_file(path: impl AsRef<Path>) -> SqliteResult<Self> {
        Self::open(&SqliteConfig::file(path)).await
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            statements: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `SELECT` statements issued for root and batch requests since the
    /// loader was opened. Clones share the count.
    pub fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    /// Run one or more `;`-separated statements, e.g. a schema script.
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Insert one row into `table`.
    pub async fn insert<'c>(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = (&'c str, Value)>,
    ) -> SqliteResult<()> {
        let (names, params): (Vec<String>, Vec<SqlValue>) = columns
            .into_iter()
            .map(|(column, value)| (quote(column), to_sql(&value)))
            .unzip();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            names.join(", "),
            placeholders(params.len())
        );
        trace!(sql = %sql, "Inserting row");

        self.conn
            .call(move |conn| {
                conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)
    }

    async fn fetch(&self, statement: Statement) -> SqliteResult<Vec<Vec<Value>>> {
        self.statements.fetch_add(1, Ordering::Relaxed);
        strata_query::strata_debug!(sql = %statement.sql, params = statement.params.len(), "Executing query");

        let Statement { sql, params } = statement;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let width = stmt.column_count();
                let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

                let mut results = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(width);
                    for index in 0..width {
                        values.push(from_sql(row.get_ref(index)?));
                    }
                    results.push(values);
                }
                Ok(results)
            })
            .await
            .map_err(SqliteError::from)
    }

    async fn load_root_rows(&self, request: &RootRequest<'_>) -> SqliteResult<Vec<Row>> {
        let raw = self.fetch(root_statement(request)).await?;
        raw.into_iter()
            .map(|values| decode(request.entity, request.fields, values))
            .collect()
    }

    async fn load_batch_rows(&self, request: &BatchRequest<'_>) -> SqliteResult<RowGroup> {
        let raw = self.fetch(batch_statement(request)?).await?;
        let mut group = RowGroup::new();
        for mut values in raw {
            if values.is_empty() {
                continue;
            }
            let parent = values.remove(0);
            let Some(parent) = Key::from_value(&parent) else {
                continue;
            };
            group.push(parent, decode(request.target, request.fields, values)?);
        }
        Ok(group)
    }
}

impl RelationLoader for SqliteLoader {
    fn load_root<'a>(&'a self, request: RootRequest<'a>) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        Box::pin(async move {
            let rows = self
                .load_root_rows(&request)
                .await
                .map_err(|e| e.into_query_error(&request.root.name))?;
            trace!(root = %request.root.name, rows = rows.len(), "SQLite root load");
            Ok(rows)
        })
    }

    fn load<'a>(&'a self, request: BatchRequest<'a>) -> BoxFuture<'a, QueryResult<RowGroup>> {
        Box::pin(async move {
            let group = self
                .load_batch_rows(&request)
                .await
                .map_err(|e| e.into_query_error(&request.name()))?;
            trace!(
                relationship = %request.name(),
                keys = request.keys.len(),
                rows = group.row_count(),
                "SQLite batch load"
            );
            Ok(group)
        })
    }
}

/// Build the statement for a root listing.
pub fn root_statement(request: &RootRequest<'_>) -> Statement {
    let entity = request.entity;
    let mut params = Vec::new();
    let clauses = filter_clauses(entity, "t", request.filter, &mut params);

    let mut sql = format!(
        "SELECT {} FROM {} AS t",
        select_list(entity, "t", request.fields),
        quote(&entity.table)
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY t.{}", quote(entity.key_column())));

    Statement { sql, params }
}

/// Build the statement for a batch request.
pub fn batch_statement(request: &BatchRequest<'_>) -> SqliteResult<Statement> {
    let source = request.source;
    let target = request.target;
    let columns = select_list(target, "t", request.fields);
    let mut params: Vec<SqlValue> = request.keys.iter().map(key_to_sql).collect();
    let keys = placeholders(request.keys.len());

    let (head, parent, order) = match &request.relationship.link {
        Link::ForeignKey { column } => (
            format!(
                "SELECT s.{pk} AS __parent, {columns} FROM {source} AS s JOIN {target} AS t ON t.{tk} = s.{fk}",
                pk = quote(source.key_column()),
                source = quote(&source.table),
                target = quote(&target.table),
                tk = quote(target.key_column()),
                fk = quote(column),
            ),
            format!("s.{}", quote(source.key_column())),
            format!("s.{}", quote(source.key_column())),
        ),
        Link::Reverse { column } => (
            format!(
                "SELECT t.{fk} AS __parent, {columns} FROM {target} AS t",
                fk = quote(column),
                target = quote(&target.table),
            ),
            format!("t.{}", quote(column)),
            format!("t.{}", quote(target.key_column())),
        ),
        Link::Join(via) => {
            let join = request.join.ok_or_else(|| {
                SqliteError::schema(format!("join entity `{}` is not registered", via.entity))
            })?;
            (
                format!(
                    "SELECT j.{sc} AS __parent, {columns} FROM {join} AS j JOIN {target} AS t ON t.{tk} = j.{tc}",
                    sc = quote(&via.source_column),
                    join = quote(&join.table),
                    target = quote(&target.table),
                    tk = quote(target.key_column()),
                    tc = quote(&via.target_column),
                ),
                format!("j.{}", quote(&via.source_column)),
                format!("j.{}", quote(join.key_column())),
            )
        }
    };

    let mut clauses = vec![format!("{} IN ({})", parent, keys)];
    clauses.extend(filter_clauses(target, "t", request.filter, &mut params));
    let sql = format!("{} WHERE {} ORDER BY {}", head, clauses.join(" AND "), order);

    Ok(Statement { sql, params })
}

fn select_list(entity: &EntityType, alias: &str, fields: &[SmolStr]) -> String {
    fields
        .iter()
        .map(|field| format!("{}.{}", alias, quote(column_of(entity, field))))
        .collect::<Vec<_>>()
        .join(", ")
}

fn filter_clauses(
    entity: &EntityType,
    alias: &str,
    filter: &Filter,
    params: &mut Vec<SqlValue>,
) -> Vec<String> {
    filter
        .conditions()
        .iter()
        .map(|condition| {
            let column = format!("{}.{}", alias, quote(column_of(entity, condition.field())));
            match condition {
                Condition::Equals { value, .. } => {
                    params.push(to_sql(value));
                    format!("{} = ?", column)
                }
                Condition::AnyOf { values, .. } if values.is_empty() => "0".to_string(),
                Condition::AnyOf { values, .. } => {
                    params.extend(values.iter().map(to_sql));
                    format!("{} IN ({})", column, placeholders(values.len()))
                }
            }
        })
        .collect()
}

fn decode(entity: &EntityType, fields: &[SmolStr], values: Vec<Value>) -> SqliteResult<Row> {
    let position = fields
        .iter()
        .position(|field| *field == entity.primary_key)
        .ok_or_else(|| {
            SqliteError::schema(format!(
                "projection of `{}` does not include its primary key",
                entity.name
            ))
        })?;
    let key = values.get(position).and_then(Key::from_value).ok_or_else(|| {
        SqliteError::type_conversion(format!(
            "row of `{}` has no usable primary key `{}`",
            entity.table,
            entity.key_column()
        ))
    })?;

    Ok(Row {
        key,
        values: fields.iter().cloned().zip(values).collect(),
    })
}

fn column_of<'e>(entity: &'e EntityType, field: &'e str) -> &'e str {
    entity
        .get_field(field)
        .map(|f| f.column.as_str())
        .unwrap_or(field)
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
