//! Relationship descriptors.
//!
//! A relationship is data: a source entity, a target entity, a cardinality and a
//! [`Link`] describing which columns connect the two tables. Both traversal
//! directions are derived from a single definition, so `Post.author` and
//! `User.posts` (or `User.following` and `User.followers`) share one edge.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Index of a relationship inside a built [`Schema`](crate::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub u32);

impl RelationshipId {
    /// Position in the registry's relationship table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How many target rows a single source row relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// The source holds a foreign key to exactly one target.
    ToOne,
    /// Inverse of a to-one: targets hold a foreign key to the source.
    ToMany,
    /// Realized through a join entity with two to-one references.
    ManyToMany,
}

impl Cardinality {
    /// Check if this relation yields a list.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::ToMany | Self::ManyToMany)
    }

    /// Check if this relation yields at most one row.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::ToOne)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToOne => write!(f, "n:1"),
            Self::ToMany => write!(f, "1:n"),
            Self::ManyToMany => write!(f, "m:n"),
        }
    }
}

/// Join entity used by a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Name of the join entity type (e.g. `Follow`).
    pub entity: SmolStr,
    /// Column on the join table referencing the source key.
    pub source_column: SmolStr,
    /// Column on the join table referencing the target key.
    pub target_column: SmolStr,
}

impl JoinSpec {
    /// Create a new join spec.
    pub fn new(
        entity: impl Into<SmolStr>,
        source_column: impl Into<SmolStr>,
        target_column: impl Into<SmolStr>,
    ) -> Self {
        Self {
            entity: entity.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// The same join table read in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            source_column: self.target_column.clone(),
            target_column: self.source_column.clone(),
        }
    }
}

/// Columns connecting the source and target tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    /// `column` on the source table references the target's key.
    ForeignKey {
        /// Foreign key column on the source table.
        column: SmolStr,
    },
    /// `column` on the target table references the source's key.
    Reverse {
        /// Foreign key column on the target table.
        column: SmolStr,
    },
    /// Rows of a join entity connect source and target keys.
    Join(JoinSpec),
}

impl Link {
    /// Cardinality implied by this link.
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::ForeignKey { .. } => Cardinality::ToOne,
            Self::Reverse { .. } => Cardinality::ToMany,
            Self::Join(_) => Cardinality::ManyToMany,
        }
    }

    /// The link traversed from the target back to the source.
    pub fn inverse(&self) -> Self {
        match self {
            Self::ForeignKey { column } => Self::Reverse {
                column: column.clone(),
            },
            Self::Reverse { column } => Self::ForeignKey {
                column: column.clone(),
            },
            Self::Join(join) => Self::Join(join.reversed()),
        }
    }
}

/// How an argument value restricts the related rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentOp {
    /// `field = value`.
    Equals,
    /// `field IN (values...)`; an empty list applies no restriction.
    AnyOf,
}

/// A filter argument accepted by a root field or relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgumentDef {
    /// Argument name (e.g. `usernames`).
    pub name: SmolStr,
    /// Scalar field on the target entity the argument filters.
    pub field: SmolStr,
    /// Comparison applied.
    pub op: ArgumentOp,
}

impl ArgumentDef {
    /// `name: value` filters `field = value`.
    pub fn equals(name: impl Into<SmolStr>, field: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            op: ArgumentOp::Equals,
        }
    }

    /// `name: [values]` filters `field IN (values)`.
    pub fn any_of(name: impl Into<SmolStr>, field: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            op: ArgumentOp::AnyOf,
        }
    }
}

/// Relationship definition handed to
/// [`SchemaBuilder::register_relationship`](crate::SchemaBuilder::register_relationship).
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDef {
    /// Target entity type.
    pub target: SmolStr,
    /// Connecting columns.
    pub link: Link,
    /// Field name of the inverse relationship on the target.
    pub inverse: Option<SmolStr>,
    /// Arguments accepted on this direction.
    pub arguments: Vec<ArgumentDef>,
    /// Arguments accepted on the inverse direction.
    pub inverse_arguments: Vec<ArgumentDef>,
}

impl RelationshipDef {
    fn new(target: impl Into<SmolStr>, link: Link) -> Self {
        Self {
            target: target.into(),
            link,
            inverse: None,
            arguments: Vec::new(),
            inverse_arguments: Vec::new(),
        }
    }

    /// To-one: `column` on the source table references the target's key.
    pub fn to_one(target: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        Self::new(
            target,
            Link::ForeignKey {
                column: column.into(),
            },
        )
    }

    /// To-many: `column` on the target table references the source's key.
    pub fn to_many(target: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        Self::new(
            target,
            Link::Reverse {
                column: column.into(),
            },
        )
    }

    /// Many-to-many through a join entity.
    pub fn many_to_many(target: impl Into<SmolStr>, join: JoinSpec) -> Self {
        Self::new(target, Link::Join(join))
    }

    /// Name the inverse relationship registered on the target.
    ///
    /// Naming the relationship itself on a self-referential many-to-many
    /// declares it symmetric.
    pub fn inverse(mut self, field: impl Into<SmolStr>) -> Self {
        self.inverse = Some(field.into());
        self
    }

    /// Accept a filter argument on this direction.
    pub fn argument(mut self, argument: ArgumentDef) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Accept a filter argument on the inverse direction.
    pub fn inverse_argument(mut self, argument: ArgumentDef) -> Self {
        self.inverse_arguments.push(argument);
        self
    }
}

/// A registered, directed relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Registry index.
    pub id: RelationshipId,
    /// Source entity type.
    pub source: SmolStr,
    /// Field name on the source.
    pub field: SmolStr,
    /// Target entity type.
    pub target: SmolStr,
    /// Cardinality of this direction.
    pub cardinality: Cardinality,
    /// Connecting columns, as seen from the source.
    pub link: Link,
    /// The relationship traversing the same edge backwards.
    pub inverse: RelationshipId,
    /// Accepted filter arguments, in declaration order.
    pub arguments: IndexMap<SmolStr, ArgumentDef>,
}

impl Relationship {
    /// `Source.field` for messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.source, self.field)
    }

    /// Check if this relationship is its own inverse.
    pub fn is_symmetric(&self) -> bool {
        self.inverse == self.id
    }

    /// Check if source and target are the same entity type.
    pub fn is_self_referential(&self) -> bool {
        self.source == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_inverse_round_trip() {
        let fk = Link::ForeignKey {
            column: "author_id".into(),
        };
        assert_eq!(fk.cardinality(), Cardinality::ToOne);
        assert_eq!(fk.inverse().cardinality(), Cardinality::ToMany);
        assert_eq!(fk.inverse().inverse(), fk);
    }

    #[test]
    fn test_join_inverse_swaps_columns() {
        let following = Link::Join(JoinSpec::new("Follow", "follower_id", "followee_id"));
        match following.inverse() {
            Link::Join(join) => {
                assert_eq!(join.entity, "Follow");
                assert_eq!(join.source_column, "followee_id");
                assert_eq!(join.target_column, "follower_id");
            }
            other => panic!("Expected join link, got {:?}", other),
        }
    }

    #[test]
    fn test_cardinality() {
        assert!(Cardinality::ToMany.is_many());
        assert!(Cardinality::ManyToMany.is_many());
        assert!(Cardinality::ToOne.is_one());
        assert_eq!(Cardinality::ManyToMany.to_string(), "m:n");
    }

    #[test]
    fn test_relationship_def_builder() {
        let def = RelationshipDef::many_to_many(
            "User",
            JoinSpec::new("Follow", "follower_id", "followee_id"),
        )
        .inverse("followers")
        .argument(ArgumentDef::any_of("usernames", "username"));

        assert_eq!(def.inverse.as_deref(), Some("followers"));
        assert_eq!(def.arguments.len(), 1);
        assert_eq!(def.link.cardinality(), Cardinality::ManyToMany);
    }
}
