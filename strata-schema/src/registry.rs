//! The schema registry.
//!
//! Entity types, relationships and root fields are registered once through a
//! [`SchemaBuilder`]; [`SchemaBuilder::build`] checks every cross reference and
//! produces an immutable [`Schema`]. Lookups on the built schema are plain
//! table lookups and need no synchronization.

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::entity::{EntityType, ScalarField};
use crate::error::{SchemaError, SchemaResult};
use crate::relation::{ArgumentDef, Link, Relationship, RelationshipDef, RelationshipId};

/// A top-level listing (e.g. `users`, `posts`).
#[derive(Debug, Clone, PartialEq)]
pub struct RootField {
    /// Field name in the query's root operation.
    pub name: SmolStr,
    /// Entity type listed.
    pub entity: SmolStr,
    /// Accepted filter arguments, in declaration order.
    pub arguments: IndexMap<SmolStr, ArgumentDef>,
}

impl RootField {
    /// Create a root listing over an entity type.
    pub fn new(name: impl Into<SmolStr>, entity: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            arguments: IndexMap::new(),
        }
    }

    /// Accept a filter argument.
    pub fn argument(mut self, argument: ArgumentDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }
}

/// Outcome of resolving a field name on an entity type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// A scalar column.
    Scalar(&'a ScalarField),
    /// A relationship to another (or the same) entity type.
    Relationship(&'a Relationship),
    /// The entity type has no such field.
    NotFound,
}

impl<'a> Resolved<'a> {
    /// Check if the field was found.
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Immutable registry of entity types, relationships and root fields.
#[derive(Debug, Clone)]
pub struct Schema {
    entities: IndexMap<SmolStr, EntityType>,
    relationships: Vec<Relationship>,
    relations_by_entity: IndexMap<SmolStr, IndexMap<SmolStr, RelationshipId>>,
    roots: IndexMap<SmolStr, RootField>,
}

impl Schema {
    /// Start registering a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Get an entity type by name.
    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    /// All entity types in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    /// Get a relationship by id.
    pub fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id.index())
    }

    /// All relationships in registration order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Get the relationship registered as `entity.field`.
    pub fn relationship_by_field(&self, entity: &str, field: &str) -> Option<&Relationship> {
        self.relations_by_entity
            .get(entity)
            .and_then(|fields| fields.get(field))
            .and_then(|id| self.relationship(*id))
    }

    /// The relationship traversing the same edge in the other direction.
    pub fn inverse_of(&self, relationship: &Relationship) -> Option<&Relationship> {
        self.relationship(relationship.inverse)
    }

    /// Resolve a field name on an entity type.
    pub fn resolve(&self, entity: &str, field: &str) -> Resolved<'_> {
        let Some(ty) = self.entities.get(entity) else {
            return Resolved::NotFound;
        };
        if let Some(scalar) = ty.get_field(field) {
            return Resolved::Scalar(scalar);
        }
        match self.relationship_by_field(entity, field) {
            Some(rel) => Resolved::Relationship(rel),
            None => Resolved::NotFound,
        }
    }

    /// Get a root field by name.
    pub fn root(&self, name: &str) -> Option<&RootField> {
        self.roots.get(name)
    }

    /// All root fields in registration order.
    pub fn roots(&self) -> impl Iterator<Item = &RootField> {
        self.roots.values()
    }
}

/// Collects registrations and validates them into a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: IndexMap<SmolStr, EntityType>,
    relationships: Vec<(SmolStr, SmolStr, RelationshipDef)>,
    roots: Vec<RootField>,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    /// Register an entity type.
    pub fn register_type(mut self, entity: EntityType) -> Self {
        if self.entities.contains_key(&entity.name) {
            self.errors
                .push(SchemaError::duplicate("entity", entity.name.as_str()));
        } else {
            self.entities.insert(entity.name.clone(), entity);
        }
        self
    }

    /// Register `from_type.field_name` and its inverse on the target.
    pub fn register_relationship(
        mut self,
        from_type: impl Into<SmolStr>,
        field_name: impl Into<SmolStr>,
        relationship: RelationshipDef,
    ) -> Self {
        self.relationships
            .push((from_type.into(), field_name.into(), relationship));
        self
    }

    /// Register a root listing.
    pub fn register_root(mut self, root: RootField) -> Self {
        self.roots.push(root);
        self
    }

    /// Validate every registration and freeze the registry.
    pub fn build(self) -> SchemaResult<Schema> {
        let SchemaBuilder {
            entities,
            relationships: defs,
            roots: root_defs,
            mut errors,
        } = self;

        let mut relationships: Vec<Relationship> = Vec::new();
        let mut relations_by_entity: IndexMap<SmolStr, IndexMap<SmolStr, RelationshipId>> =
            entities
                .keys()
                .map(|name| (name.clone(), IndexMap::new()))
                .collect();

        for (from, field, def) in defs {
            match register_edge(&entities, &relations_by_entity, relationships.len(), &from, &field, def) {
                Ok(edge) => {
                    for rel in edge {
                        if let Some(fields) = relations_by_entity.get_mut(&rel.source) {
                            fields.insert(rel.field.clone(), rel.id);
                        }
                        relationships.push(rel);
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        let mut roots: IndexMap<SmolStr, RootField> = IndexMap::new();
        for root in root_defs {
            if roots.contains_key(&root.name) {
                errors.push(SchemaError::duplicate("root field", root.name.as_str()));
                continue;
            }
            let Some(entity) = entities.get(&root.entity) else {
                errors.push(SchemaError::unknown_entity(
                    root.entity.as_str(),
                    root.name.as_str(),
                ));
                continue;
            };
            let args: Vec<ArgumentDef> = root.arguments.values().cloned().collect();
            if let Err(e) = check_arguments(root.name.as_str(), entity, &args) {
                errors.push(e);
                continue;
            }
            roots.insert(root.name.clone(), root);
        }

        match errors.len() {
            0 => {
                debug!(
                    entities = entities.len(),
                    relationships = relationships.len(),
                    roots = roots.len(),
                    "Schema registry built"
                );
                Ok(Schema {
                    entities,
                    relationships,
                    relations_by_entity,
                    roots,
                })
            }
            1 => Err(errors.remove(0)),
            count => Err(SchemaError::RegistrationFailed { count, errors }),
        }
    }
}

/// Validate one definition and produce the relationship(s) it registers.
fn register_edge(
    entities: &IndexMap<SmolStr, EntityType>,
    registered: &IndexMap<SmolStr, IndexMap<SmolStr, RelationshipId>>,
    next_id: usize,
    from: &SmolStr,
    field: &SmolStr,
    def: RelationshipDef,
) -> SchemaResult<Vec<Relationship>> {
    let qualified = format!("{}.{}", from, field);
    let source = entities
        .get(from)
        .ok_or_else(|| SchemaError::unknown_entity(from.as_str(), qualified.as_str()))?;
    let target = entities
        .get(&def.target)
        .ok_or_else(|| SchemaError::unknown_entity(def.target.as_str(), qualified.as_str()))?;
    if let Link::Join(join) = &def.link {
        if !entities.contains_key(&join.entity) {
            return Err(SchemaError::unknown_entity(
                join.entity.as_str(),
                qualified.as_str(),
            ));
        }
    }
    let inverse = def.inverse.clone().ok_or_else(|| {
        SchemaError::invalid_relationship(
            from.as_str(),
            field.as_str(),
            "every relationship needs a named inverse",
        )
    })?;

    check_free(source, registered, field)?;
    let forward_args = check_arguments(&qualified, target, &def.arguments)?;

    let forward_id = RelationshipId(next_id as u32);
    let symmetric = inverse == *field && source.name == target.name;

    if symmetric {
        if !matches!(def.link, Link::Join(_)) {
            return Err(SchemaError::invalid_relationship(
                from.as_str(),
                field.as_str(),
                "only a many-to-many relationship can be its own inverse",
            ));
        }
        return Ok(vec![Relationship {
            id: forward_id,
            source: source.name.clone(),
            field: field.clone(),
            target: target.name.clone(),
            cardinality: def.link.cardinality(),
            link: def.link,
            inverse: forward_id,
            arguments: forward_args,
        }]);
    }

    check_free(target, registered, &inverse)?;
    let inverse_qualified = format!("{}.{}", target.name, inverse);
    let inverse_args = check_arguments(&inverse_qualified, source, &def.inverse_arguments)?;

    let inverse_id = RelationshipId(next_id as u32 + 1);
    let inverse_link = def.link.inverse();
    Ok(vec![
        Relationship {
            id: forward_id,
            source: source.name.clone(),
            field: field.clone(),
            target: target.name.clone(),
            cardinality: def.link.cardinality(),
            link: def.link,
            inverse: inverse_id,
            arguments: forward_args,
        },
        Relationship {
            id: inverse_id,
            source: target.name.clone(),
            field: inverse,
            target: source.name.clone(),
            cardinality: inverse_link.cardinality(),
            link: inverse_link,
            inverse: forward_id,
            arguments: inverse_args,
        },
    ])
}

/// Ensure `entity.field` is not taken by a scalar or an earlier relationship.
fn check_free(
    entity: &EntityType,
    registered: &IndexMap<SmolStr, IndexMap<SmolStr, RelationshipId>>,
    field: &SmolStr,
) -> SchemaResult<()> {
    let taken_by_relation = registered
        .get(&entity.name)
        .is_some_and(|fields| fields.contains_key(field));
    if entity.get_field(field).is_some() || taken_by_relation {
        return Err(SchemaError::duplicate(
            "field",
            format!("{}.{}", entity.name, field),
        ));
    }
    Ok(())
}

/// Check that every argument filters an existing scalar of `target`.
fn check_arguments(
    owner: &str,
    target: &EntityType,
    arguments: &[ArgumentDef],
) -> SchemaResult<IndexMap<SmolStr, ArgumentDef>> {
    let mut checked = IndexMap::new();
    for arg in arguments {
        if target.get_field(&arg.field).is_none() {
            return Err(SchemaError::invalid_argument(
                owner,
                arg.name.as_str(),
                format!("`{}` has no scalar field `{}`", target.name, arg.field),
            ));
        }
        if checked.insert(arg.name.clone(), arg.clone()).is_some() {
            return Err(SchemaError::duplicate(
                "argument",
                format!("{}({})", owner, arg.name),
            ));
        }
    }
    Ok(checked)
}
