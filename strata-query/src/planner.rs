//! Breadth-first batch planning.
//!
//! The planner resolves a [`BoundQuery`] one level at a time:
//!
//! 1. Level 0 issues one fetch per root listing.
//! 2. At level n every relationship selection hanging off a level-n object is
//!    grouped into a partition keyed by (relationship, filter). Parent keys are
//!    collected across all branches and deduplicated, then each partition is
//!    sent to the loader as exactly one [`BatchRequest`].
//! 3. Each parent receives the rows keyed to its own primary key, in loader
//!    order. New objects with further relationship selections form level n+1.
//!
//! Partitions of one level are dispatched concurrently, bounded by
//! `max_concurrency`; level n+1 starts only when every level-n batch has
//! returned. A failed batch marks the fields that depended on it and the
//! other partitions carry on.
//!
//! Results are kept in an arena of objects indexed by [`ObjectId`]; the
//! assembler turns it into the response tree afterwards.

use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::bind::{BoundField, BoundQuery, BoundRelation, BoundSelection};
use crate::cost::QueryCounter;
use crate::error::{QueryError, QueryResult};
use crate::loader::{BatchRequest, BoxFuture, RelationLoader, RootRequest};
use crate::resolver::{CancelToken, ResolverOptions};
use crate::value::{Key, Row, RowGroup};

/// Index of an object in the [`Execution`] arena.
pub(crate) type ObjectId = usize;

/// Resolution state of one field of one object.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Read from the object's row.
    Scalar,
    /// Not fetched (yet).
    Pending,
    /// To-many result.
    Many(Vec<ObjectId>),
    /// To-one result.
    One(Option<ObjectId>),
    /// The batch failed; index into [`Execution::failures`].
    Failed(usize),
}

/// A loaded row and the selection applied to it.
#[derive(Debug)]
pub(crate) struct Object<'q, 's> {
    pub(crate) row: Row,
    pub(crate) selection: &'q BoundSelection<'s>,
    pub(crate) slots: Vec<Slot>,
}

/// Outcome of a root listing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootSlot {
    Rows(Vec<ObjectId>),
    Failed(usize),
}

/// Everything loaded by one resolution.
#[derive(Debug, Default)]
pub(crate) struct Execution<'q, 's> {
    pub(crate) objects: Vec<Object<'q, 's>>,
    pub(crate) roots: Vec<RootSlot>,
    pub(crate) failures: Vec<QueryError>,
}

impl<'q, 's> Execution<'q, 's> {
    pub(crate) fn push(&mut self, row: Row, selection: &'q BoundSelection<'s>) -> ObjectId {
        let slots = selection
            .fields
            .iter()
            .map(|field| match field {
                BoundField::Scalar { .. } => Slot::Scalar,
                BoundField::Relation(_) => Slot::Pending,
            })
            .collect();
        self.objects.push(Object {
            row,
            selection,
            slots,
        });
        self.objects.len() - 1
    }

    pub(crate) fn fail(&mut self, error: QueryError) -> usize {
        self.failures.push(error);
        self.failures.len() - 1
    }
}

/// A field waiting for a partition: the parent object, the slot to fill and
/// the selection the field itself asked for.
type Member<'q, 's> = (ObjectId, usize, &'q BoundRelation<'s>);

/// One batch request of a level and the fields waiting for it.
#[derive(Debug)]
struct Partition<'q, 's> {
    relation: &'q BoundRelation<'s>,
    keys: Vec<Key>,
    fields: Vec<SmolStr>,
    members: Vec<Member<'q, 's>>,
}

impl Partition<'_, '_> {
    fn request(&self) -> BatchRequest<'_> {
        BatchRequest {
            relationship: self.relation.relationship,
            source: self.relation.source,
            target: self.relation.target,
            join: self.relation.join,
            keys: &self.keys,
            filter: &self.relation.filter,
            fields: &self.fields,
        }
    }
}

#[derive(Debug)]
struct PartitionBuilder<'q, 's> {
    relation: &'q BoundRelation<'s>,
    merged: Vec<&'q BoundRelation<'s>>,
    keys: IndexSet<Key>,
    fields: IndexSet<SmolStr>,
    members: Vec<Member<'q, 's>>,
}

impl<'q, 's> PartitionBuilder<'q, 's> {
    fn new(relation: &'q BoundRelation<'s>) -> Self {
        Self {
            relation,
            merged: Vec::new(),
            keys: IndexSet::new(),
            fields: IndexSet::new(),
            members: Vec::new(),
        }
    }

    fn add(&mut self, id: ObjectId, key: &Key, slot: usize, relation: &'q BoundRelation<'s>) {
        if !self.merged.iter().any(|r| std::ptr::eq(*r, relation)) {
            self.merged.push(relation);
            self.fields
                .extend(relation.selection.projection(relation.target));
        }
        if !self.keys.contains(key) {
            self.keys.insert(key.clone());
        }
        self.members.push((id, slot, relation));
    }

    fn build(self) -> Partition<'q, 's> {
        Partition {
            relation: self.relation,
            keys: self.keys.into_iter().collect(),
            fields: self.fields.into_iter().collect(),
            members: self.members,
        }
    }
}

/// Group the relationship selections of `frontier` into batch partitions.
fn plan_level<'q, 's>(objects: &[Object<'q, 's>], frontier: &[ObjectId]) -> Vec<Partition<'q, 's>> {
    let mut builders: Vec<PartitionBuilder<'q, 's>> = Vec::new();

    for &id in frontier {
        let object = &objects[id];
        let selection: &'q BoundSelection<'s> = object.selection;
        for (slot, relation) in selection.relations() {
            let index = match builders
                .iter()
                .position(|b| b.relation.same_partition(relation))
            {
                Some(index) => index,
                None => {
                    builders.push(PartitionBuilder::new(relation));
                    builders.len() - 1
                }
            };
            builders[index].add(id, &object.row.key, slot, relation);
        }
    }

    builders.into_iter().map(PartitionBuilder::build).collect()
}

/// Drives the level loop for one resolution.
pub(crate) struct Planner<'a, L: ?Sized> {
    loader: &'a L,
    counter: &'a QueryCounter,
    options: &'a ResolverOptions,
    cancel: &'a CancelToken,
}

impl<'a, L: RelationLoader + ?Sized> Planner<'a, L> {
    pub(crate) fn new(
        loader: &'a L,
        counter: &'a QueryCounter,
        options: &'a ResolverOptions,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            loader,
            counter,
            options,
            cancel,
        }
    }

    /// Load every level of `query`.
    pub(crate) async fn execute<'q, 's>(
        &self,
        query: &'q BoundQuery<'s>,
    ) -> QueryResult<Execution<'q, 's>> {
        let mut execution = Execution::default();

        self.checkpoint(0)?;
        let mut frontier = self.load_roots(query, &mut execution).await;

        let mut level = 1;
        while !frontier.is_empty() {
            self.checkpoint(level)?;
            let partitions = plan_level(&execution.objects, &frontier);
            if partitions.is_empty() {
                break;
            }
            frontier = self.load_level(level, partitions, &mut execution).await;
            level += 1;
        }

        // A cancel that arrived during the last level still discards it.
        self.checkpoint(level)?;
        Ok(execution)
    }

    fn checkpoint(&self, level: usize) -> QueryResult<()> {
        if self.cancel.is_cancelled() {
            debug!(level, "Resolution cancelled at level boundary");
            return Err(QueryError::cancelled());
        }
        Ok(())
    }

    fn concurrency(&self) -> usize {
        self.options.max_concurrency.max(1)
    }

    async fn load_roots<'q, 's>(
        &self,
        query: &'q BoundQuery<'s>,
        execution: &mut Execution<'q, 's>,
    ) -> Vec<ObjectId> {
        if query.roots.is_empty() {
            return Vec::new();
        }

        let projections: Vec<Vec<SmolStr>> = query
            .roots
            .iter()
            .map(|root| root.selection.projection(root.entity))
            .collect();
        debug!(level = 0, roots = query.roots.len(), "Dispatching root listings");

        let fetches: Vec<BoxFuture<'_, QueryResult<Vec<Row>>>> = query
            .roots
            .iter()
            .zip(&projections)
            .map(|(root, fields)| {
                self.loader.load_root(RootRequest {
                    root: root.root,
                    entity: root.entity,
                    filter: &root.filter,
                    fields,
                })
            })
            .collect();
        let results: Vec<QueryResult<Vec<Row>>> = stream::iter(fetches)
            .buffered(self.concurrency())
            .collect()
            .await;
        self.counter.record_level();

        let mut frontier = Vec::new();
        for (root, result) in query.roots.iter().zip(results) {
            match result {
                Ok(rows) => {
                    let ids: Vec<ObjectId> = rows
                        .into_iter()
                        .map(|row| execution.push(row, &root.selection))
                        .collect();
                    if root.selection.has_relations() {
                        frontier.extend(ids.iter().copied());
                    }
                    execution.roots.push(RootSlot::Rows(ids));
                }
                Err(e) => {
                    warn!(root = %root.root.name, error = %e, "Root fetch failed");
                    let index = execution.fail(e);
                    execution.roots.push(RootSlot::Failed(index));
                }
            }
        }
        frontier
    }

    async fn load_level<'q, 's>(
        &self,
        level: usize,
        partitions: Vec<Partition<'q, 's>>,
        execution: &mut Execution<'q, 's>,
    ) -> Vec<ObjectId> {
        debug!(level, partitions = partitions.len(), "Dispatching level");
        if self.options.log_batches {
            for partition in &partitions {
                debug!(
                    level,
                    relationship = %partition.relation.relationship.qualified_name(),
                    keys = partition.keys.len(),
                    filter = %partition.relation.filter,
                    "Batch request"
                );
            }
        }

        let fetches: Vec<BoxFuture<'_, QueryResult<RowGroup>>> = partitions
            .iter()
            .map(|partition| self.loader.load(partition.request()))
            .collect();
        let results: Vec<QueryResult<RowGroup>> = stream::iter(fetches)
            .buffered(self.concurrency())
            .collect()
            .await;
        self.counter.record_level();

        let mut frontier = Vec::new();
        for (partition, result) in partitions.iter().zip(results) {
            let relation = partition.relation;
            match result {
                Ok(group) => {
                    let many = relation.relationship.cardinality.is_many();
                    // Merged selections share the rows but keep their own sub-fields.
                    for &(parent, slot, member) in &partition.members {
                        let rows = group.get(&execution.objects[parent].row.key);
                        let rows = if many { rows } else { &rows[..rows.len().min(1)] };
                        let ids: Vec<ObjectId> = rows
                            .iter()
                            .map(|row| execution.push(row.clone(), &member.selection))
                            .collect();
                        if member.selection.has_relations() {
                            frontier.extend(ids.iter().copied());
                        }
                        execution.objects[parent].slots[slot] = if many {
                            Slot::Many(ids)
                        } else {
                            Slot::One(ids.first().copied())
                        };
                    }
                }
                Err(e) => {
                    warn!(
                        level,
                        relationship = %relation.relationship.qualified_name(),
                        error = %e,
                        "Batch fetch failed"
                    );
                    let index = execution.fail(e);
                    for &(parent, slot, _) in &partition.members {
                        execution.objects[parent].slots[slot] = Slot::Failed(index);
                    }
                }
            }
        }
        frontier
    }
}
