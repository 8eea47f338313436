//! Pre-flight validation and binding.
//!
//! The binder checks a [`Query`] against the [`Schema`] before anything is
//! fetched: unknown fields and arguments, argument types, conflicting response
//! keys and the depth limit all fail here. The output is a tree of references
//! into the schema that the planner walks without further lookups.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use strata_schema::{
    ArgumentDef, ArgumentOp, EntityType, Link, Relationship, Resolved, RootField, ScalarField,
    Schema,
};

use crate::error::{QueryError, QueryResult};
use crate::filter::{Condition, Filter};
use crate::selection::{Arguments, Query, Selection};
use crate::value::Value;

/// A query bound to the schema.
#[derive(Debug, Clone)]
pub struct BoundQuery<'s> {
    /// Root selections, in request order.
    pub roots: Vec<BoundRoot<'s>>,
    /// Deepest relationship nesting, roots counting as 1.
    pub depth: usize,
}

/// A bound root listing.
#[derive(Debug, Clone)]
pub struct BoundRoot<'s> {
    /// Key under which the listing appears in the response.
    pub response_key: SmolStr,
    /// Root field definition.
    pub root: &'s RootField,
    /// Listed entity type.
    pub entity: &'s EntityType,
    /// Canonical filter built from the arguments.
    pub filter: Filter,
    /// Fields selected on each listed row.
    pub selection: BoundSelection<'s>,
}

/// A bound selection set on one entity type.
#[derive(Debug, Clone, Default)]
pub struct BoundSelection<'s> {
    /// Fields in request order, merged by response key.
    pub fields: Vec<BoundField<'s>>,
}

impl<'s> BoundSelection<'s> {
    /// Check if only the related primary keys were requested.
    pub fn is_ids_only(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check if any field needs a further fetch.
    pub fn has_relations(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f, BoundField::Relation(_)))
    }

    /// Relationship selections with their position in `fields`.
    pub fn relations(&self) -> impl Iterator<Item = (usize, &BoundRelation<'s>)> {
        self.fields.iter().enumerate().filter_map(|(i, f)| match f {
            BoundField::Relation(rel) => Some((i, rel)),
            BoundField::Scalar { .. } => None,
        })
    }

    /// Scalar field names a loader must return: the primary key first, then
    /// every selected scalar once.
    pub fn projection(&self, entity: &EntityType) -> Vec<SmolStr> {
        let mut fields = IndexSet::new();
        fields.insert(entity.primary_key.clone());
        for field in &self.fields {
            if let BoundField::Scalar { field, .. } = field {
                fields.insert(field.name.clone());
            }
        }
        fields.into_iter().collect()
    }
}

/// A bound field.
#[derive(Debug, Clone)]
pub enum BoundField<'s> {
    /// A scalar read from the parent row.
    Scalar {
        /// Response key.
        response_key: SmolStr,
        /// Field definition.
        field: &'s ScalarField,
    },
    /// A relationship resolved by a batch request.
    Relation(BoundRelation<'s>),
}

impl<'s> BoundField<'s> {
    /// Key under which the field appears in the response.
    pub fn response_key(&self) -> &SmolStr {
        match self {
            Self::Scalar { response_key, .. } => response_key,
            Self::Relation(rel) => &rel.response_key,
        }
    }
}

/// A bound relationship selection.
#[derive(Debug, Clone)]
pub struct BoundRelation<'s> {
    /// Response key.
    pub response_key: SmolStr,
    /// The relationship traversed.
    pub relationship: &'s Relationship,
    /// Entity type holding the relationship.
    pub source: &'s EntityType,
    /// Entity type the relationship leads to.
    pub target: &'s EntityType,
    /// Join entity, for many-to-many relationships.
    pub join: Option<&'s EntityType>,
    /// Canonical filter built from the arguments.
    pub filter: Filter,
    /// Fields selected on each related row.
    pub selection: BoundSelection<'s>,
}

impl<'s> BoundRelation<'s> {
    /// Check if another selection can share this one's batch request.
    pub fn same_partition(&self, other: &BoundRelation<'_>) -> bool {
        self.relationship.id == other.relationship.id && self.filter == other.filter
    }
}

/// Validates queries against a schema.
#[derive(Debug, Clone, Copy)]
pub struct Binder<'s> {
    schema: &'s Schema,
    max_depth: usize,
}

impl<'s> Binder<'s> {
    /// Create a binder enforcing `max_depth`.
    pub fn new(schema: &'s Schema, max_depth: usize) -> Self {
        Self { schema, max_depth }
    }

    /// Validate and bind a query.
    pub fn bind(&self, query: &Query) -> QueryResult<BoundQuery<'s>> {
        let mut roots = Vec::with_capacity(query.selections.len());
        let mut depth = 0;

        for selection in merge_by_response_key(&query.selections)? {
            let root = self
                .schema
                .root(&selection.field)
                .ok_or_else(|| QueryError::unknown_root_field(selection.field.as_str()))?;
            let entity = self.entity(&root.entity)?;

            self.check_depth(1, selection.response_key())?;
            let filter = bind_arguments(
                root.name.as_str(),
                &root.arguments,
                entity,
                &selection.arguments,
            )?;
            let (bound, sub_depth) =
                self.bind_selection(entity, &selection.children, 1, selection.response_key())?;
            depth = depth.max(sub_depth);

            roots.push(BoundRoot {
                response_key: selection.response_key().clone(),
                root,
                entity,
                filter,
                selection: bound,
            });
        }

        Ok(BoundQuery { roots, depth })
    }

    fn bind_selection(
        &self,
        entity: &'s EntityType,
        selections: &[Selection],
        depth: usize,
        path: &str,
    ) -> QueryResult<(BoundSelection<'s>, usize)> {
        let mut fields = Vec::with_capacity(selections.len());
        let mut max_depth = depth;

        for selection in merge_by_response_key(selections)? {
            let key = selection.response_key().clone();
            let child_path = format!("{}.{}", path, key);

            match self.schema.resolve(&entity.name, &selection.field) {
                Resolved::Scalar(field) => {
                    if let Some(arg) = selection.arguments.keys().next() {
                        return Err(QueryError::unknown_argument(
                            format!("{}.{}", entity.name, field.name),
                            arg.as_str(),
                        )
                        .with_path(child_path));
                    }
                    if !selection.children.is_empty() {
                        return Err(QueryError::invalid_selection(
                            key.as_str(),
                            format!("scalar field `{}` has no sub-fields", field.name),
                        )
                        .with_entity(entity.name.as_str())
                        .with_path(child_path));
                    }
                    fields.push(BoundField::Scalar {
                        response_key: key,
                        field,
                    });
                }
                Resolved::Relationship(relationship) => {
                    self.check_depth(depth + 1, &child_path)?;
                    let target = self.entity(&relationship.target)?;
                    let join = match &relationship.link {
                        Link::Join(join) => Some(self.entity(&join.entity)?),
                        Link::ForeignKey { .. } | Link::Reverse { .. } => None,
                    };
                    let filter = bind_arguments(
                        &relationship.qualified_name(),
                        &relationship.arguments,
                        target,
                        &selection.arguments,
                    )
                    .map_err(|e| e.with_path(child_path.as_str()))?;
                    let (bound, sub_depth) =
                        self.bind_selection(target, &selection.children, depth + 1, &child_path)?;
                    max_depth = max_depth.max(sub_depth);

                    fields.push(BoundField::Relation(BoundRelation {
                        response_key: key,
                        relationship,
                        source: entity,
                        target,
                        join,
                        filter,
                        selection: bound,
                    }));
                }
                Resolved::NotFound => {
                    return Err(
                        QueryError::unknown_field(entity.name.as_str(), selection.field.as_str())
                            .with_path(child_path),
                    );
                }
            }
        }

        Ok((BoundSelection { fields }, max_depth))
    }

    fn check_depth(&self, depth: usize, path: &str) -> QueryResult<()> {
        if depth > self.max_depth {
            return Err(QueryError::depth_exceeded(depth, self.max_depth).with_path(path));
        }
        Ok(())
    }

    fn entity(&self, name: &str) -> QueryResult<&'s EntityType> {
        self.schema
            .entity(name)
            .ok_or_else(|| QueryError::internal(format!("entity type `{}` is not registered", name)))
    }
}

/// Merge selections sharing a response key.
///
/// Identical field and arguments merge their children; anything else is a
/// conflict.
fn merge_by_response_key(selections: &[Selection]) -> QueryResult<Vec<Selection>> {
    let mut merged: IndexMap<SmolStr, Selection> = IndexMap::with_capacity(selections.len());

    for selection in selections {
        let key = selection.response_key().clone();
        match merged.get_mut(&key) {
            Some(existing) => {
                if existing.field != selection.field {
                    return Err(QueryError::invalid_selection(
                        key.as_str(),
                        format!(
                            "response key selects both `{}` and `{}`",
                            existing.field, selection.field
                        ),
                    ));
                }
                if existing.arguments != selection.arguments {
                    return Err(QueryError::invalid_selection(
                        key.as_str(),
                        "response key selected twice with different arguments",
                    ));
                }
                existing.children.extend(selection.children.iter().cloned());
            }
            None => {
                merged.insert(key, selection.clone());
            }
        }
    }

    Ok(merged.into_values().collect())
}

/// Turn supplied arguments into a canonical filter.
///
/// Conditions follow declaration order. Null arguments and empty lists apply
/// no restriction.
fn bind_arguments(
    owner: &str,
    declared: &IndexMap<SmolStr, ArgumentDef>,
    target: &EntityType,
    supplied: &Arguments,
) -> QueryResult<Filter> {
    if let Some(unknown) = supplied.keys().find(|name| !declared.contains_key(*name)) {
        return Err(QueryError::unknown_argument(owner, unknown.as_str()));
    }

    let mut filter = Filter::none();
    for def in declared.values() {
        let Some(value) = supplied.get(&def.name) else {
            continue;
        };
        let field = target.get_field(&def.field).ok_or_else(|| {
            QueryError::internal(format!(
                "argument `{}` of `{}` filters unknown field `{}`",
                def.name, owner, def.field
            ))
        })?;

        match def.op {
            ArgumentOp::Equals => match value {
                Value::Null => {}
                Value::List(_) => {
                    return Err(QueryError::invalid_argument(
                        owner,
                        def.name.as_str(),
                        "expected a single value, found a list",
                    ));
                }
                single => filter.push(Condition::Equals {
                    field: field.name.clone(),
                    value: coerce(owner, def, field, single)?,
                }),
            },
            ArgumentOp::AnyOf => {
                let items: &[Value] = match value {
                    Value::Null => &[],
                    Value::List(items) => items,
                    single => std::slice::from_ref(single),
                };
                if items.is_empty() {
                    continue;
                }
                let values = items
                    .iter()
                    .map(|item| coerce(owner, def, field, item))
                    .collect::<QueryResult<Vec<_>>>()?;
                filter.push(Condition::AnyOf {
                    field: field.name.clone(),
                    values,
                });
            }
        }
    }

    Ok(filter)
}

fn coerce(owner: &str, def: &ArgumentDef, field: &ScalarField, value: &Value) -> QueryResult<Value> {
    value.coerce_to(field.scalar_type).ok_or_else(|| {
        QueryError::invalid_argument(
            owner,
            def.name.as_str(),
            format!("expected {}, found {}", field.scalar_type, value.type_name()),
        )
    })
}
