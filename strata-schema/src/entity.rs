//! Entity types and their scalar fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Scalar value types an entity field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// 64-bit signed integer.
    Int,
    /// Double precision float.
    Float,
    /// UTF-8 text.
    String,
    /// Boolean.
    Boolean,
}

impl ScalarType {
    /// Get the type name as written in a query language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar field on an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarField {
    /// Field name as exposed to queries.
    pub name: SmolStr,
    /// Backing column name.
    pub column: SmolStr,
    /// Value type.
    pub scalar_type: ScalarType,
    /// Whether the field may be null.
    pub nullable: bool,
}

impl ScalarField {
    /// Create a required field backed by a column of the same name.
    pub fn new(name: impl Into<SmolStr>, scalar_type: ScalarType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            scalar_type,
            nullable: false,
        }
    }

    /// Mark the field as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Back the field with a differently named column.
    pub fn column(mut self, column: impl Into<SmolStr>) -> Self {
        self.column = column.into();
        self
    }
}

/// A named record kind with a primary key and scalar fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Type name (e.g. `User`).
    pub name: SmolStr,
    /// Backing table.
    pub table: SmolStr,
    /// Name of the primary key field.
    pub primary_key: SmolStr,
    /// Scalar fields, in declaration order.
    pub fields: IndexMap<SmolStr, ScalarField>,
}

impl EntityType {
    /// Create an entity type whose primary key is an integer `id` field.
    pub fn new(name: impl Into<SmolStr>, table: impl Into<SmolStr>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(SmolStr::new_static("id"), ScalarField::new("id", ScalarType::Int));
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: SmolStr::new_static("id"),
            fields,
        }
    }

    /// Use a different field as primary key.
    ///
    /// The field is added as a required scalar if it is not declared yet.
    pub fn primary_key(mut self, field: ScalarField) -> Self {
        if self.primary_key == "id" && field.name != "id" {
            self.fields.shift_remove("id");
        }
        self.primary_key = field.name.clone();
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Add a scalar field.
    pub fn field(mut self, field: ScalarField) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Get a scalar field by name.
    pub fn get_field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.get(name)
    }

    /// Get the primary key field.
    pub fn key_field(&self) -> Option<&ScalarField> {
        self.fields.get(&self.primary_key)
    }

    /// Column backing the primary key.
    pub fn key_column(&self) -> &str {
        self.key_field()
            .map(|f| f.column.as_str())
            .unwrap_or(self.primary_key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_defaults_to_id_key() {
        let user = EntityType::new("User", "users")
            .field(ScalarField::new("username", ScalarType::String));

        assert_eq!(user.primary_key, "id");
        assert_eq!(user.key_column(), "id");
        assert_eq!(user.fields.len(), 2);
        assert_eq!(user.fields.get_index(0).map(|(k, _)| k.as_str()), Some("id"));
    }

    #[test]
    fn test_custom_primary_key_replaces_id() {
        let tag = EntityType::new("Tag", "tags")
            .primary_key(ScalarField::new("slug", ScalarType::String).column("tag_slug"));

        assert_eq!(tag.primary_key, "slug");
        assert!(tag.get_field("id").is_none());
        assert_eq!(tag.key_column(), "tag_slug");
    }

    #[test]
    fn test_nullable_field() {
        let bio = ScalarField::new("bio", ScalarType::String).nullable();
        assert!(bio.nullable);
        assert_eq!(bio.column, "bio");
    }

    #[test]
    fn test_scalar_type_display() {
        assert_eq!(ScalarType::Boolean.to_string(), "Boolean");
        assert_eq!(ScalarType::Int.as_str(), "Int");
    }
}
