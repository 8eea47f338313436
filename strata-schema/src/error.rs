//! Error types for schema registration and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building the registry or loading configuration.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(strata::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid entity type definition.
    #[error("invalid entity `{name}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_entity))]
    InvalidEntity { name: String, message: String },

    /// Invalid relationship definition.
    #[error("invalid relationship `{entity}.{field}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_relationship))]
    InvalidRelationship {
        entity: String,
        field: String,
        message: String,
    },

    /// Invalid argument declaration.
    #[error("invalid argument `{argument}` on `{owner}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_argument))]
    InvalidArgument {
        owner: String,
        argument: String,
        message: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(strata::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Reference to an entity type that was never registered.
    #[error("unknown entity type `{name}` referenced by `{referenced_by}`")]
    #[diagnostic(
        code(strata::schema::unknown_entity),
        help("register the entity with `register_type` before referencing it")
    )]
    UnknownEntity { name: String, referenced_by: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(strata::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(strata::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Registration failed with multiple issues.
    #[error("schema registration failed with {count} error(s)")]
    #[diagnostic(code(strata::schema::registration_failed))]
    RegistrationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create an invalid entity error.
    pub fn invalid_entity(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid relationship error.
    pub fn invalid_relationship(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelationship {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(
        owner: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            owner: owner.into(),
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an unknown entity error.
    pub fn unknown_entity(name: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::UnknownEntity {
            name: name.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
