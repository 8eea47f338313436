//! Error types for resolution with actionable messages.
//!
//! Every error carries an [`ErrorCode`] for programmatic handling, a message,
//! and an [`ErrorContext`] naming the entity, field and response path involved.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Selection errors (unknown field, bad argument, depth)
//! - 3xxx: Loader errors (store unreachable, bad rows)
//! - 5xxx: Execution errors (cancellation)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use strata_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_field("User", "email");
//! assert_eq!(err.code, ErrorCode::UnknownField);
//! assert_eq!(err.code.code(), "S1001");
//! assert!(err.is_validation_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for resolution operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Selection errors (1xxx)
    /// Field absent from the schema registry (S1001).
    UnknownField = 1001,
    /// Root field absent from the schema registry (S1002).
    UnknownRootField = 1002,
    /// Argument not declared for the field (S1003).
    UnknownArgument = 1003,
    /// Argument value of the wrong shape or type (S1004).
    InvalidArgument = 1004,
    /// Malformed selection (conflicting response keys, sub-selection on a scalar) (S1005).
    InvalidSelection = 1005,
    /// Selection nested deeper than the configured maximum (S1006).
    CycleDepthExceeded = 1006,

    // Loader errors (3xxx)
    /// The backing store could not serve a batch (S3001).
    LoaderUnavailable = 3001,
    /// The loader returned rows that do not fit the request (S3002).
    InvalidRow = 3002,

    // Execution errors (5xxx)
    /// The resolution was cancelled (S5001).
    Cancelled = 5001,

    // Internal errors (9xxx)
    /// Internal error (S9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownField => "Unknown field",
            Self::UnknownRootField => "Unknown root field",
            Self::UnknownArgument => "Unknown argument",
            Self::InvalidArgument => "Invalid argument",
            Self::InvalidSelection => "Invalid selection",
            Self::CycleDepthExceeded => "Selection too deep",
            Self::LoaderUnavailable => "Loader unavailable",
            Self::InvalidRow => "Invalid row",
            Self::Cancelled => "Resolution cancelled",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl serde::Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The entity type involved.
    pub entity: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// Response path of the affected selection (e.g. `users.0.following`).
    pub path: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while resolving a selection tree.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the response path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.context.path = Some(path.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// A selection names a field the entity type does not have.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownField,
            format!("Cannot query field `{}` on type `{}`", field, entity),
        )
        .with_entity(&entity)
        .with_field(&field)
        .with_suggestion(format!("Check the fields registered for `{}`", entity))
    }

    /// A query names a root field that is not registered.
    pub fn unknown_root_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::UnknownRootField,
            format!("Cannot query root field `{}`", field),
        )
        .with_field(&field)
    }

    /// An argument is not declared on the field.
    pub fn unknown_argument(field: impl Into<String>, argument: impl Into<String>) -> Self {
        let field = field.into();
        let argument = argument.into();
        Self::new(
            ErrorCode::UnknownArgument,
            format!("Unknown argument `{}` on field `{}`", argument, field),
        )
        .with_field(&field)
    }

    /// An argument value does not fit its declaration.
    pub fn invalid_argument(
        field: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::InvalidArgument,
            format!(
                "Invalid value for argument `{}` on `{}`: {}",
                argument.into(),
                field,
                message.into()
            ),
        )
        .with_field(&field)
    }

    /// A selection set is malformed.
    pub fn invalid_selection(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::InvalidSelection,
            format!("Invalid selection `{}`: {}", field, message.into()),
        )
        .with_field(&field)
    }

    /// The selection tree is nested deeper than allowed.
    pub fn depth_exceeded(depth: usize, max_depth: usize) -> Self {
        Self::new(
            ErrorCode::CycleDepthExceeded,
            format!(
                "Selection depth {} exceeds the maximum of {}",
                depth, max_depth
            ),
        )
        .with_suggestion("Reduce the nesting of the query")
        .with_help("The limit is set by `resolver.max_depth` in strata.toml")
    }

    /// A batch could not be served by the backing store.
    pub fn loader_unavailable(relationship: impl Into<String>, message: impl Into<String>) -> Self {
        let relationship = relationship.into();
        Self::new(
            ErrorCode::LoaderUnavailable,
            format!("Loading `{}` failed: {}", relationship, message.into()),
        )
        .with_field(&relationship)
        .with_suggestion("Check that the backing store is reachable")
    }

    /// A loaded row does not fit the request.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRow, message.into())
    }

    /// The resolution was cancelled at a level boundary.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Resolution cancelled")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
            .with_help("This is likely a bug in Strata - please report it")
    }

    // ============== Error Checks ==============

    /// Check if this error was raised by the pre-flight validation pass.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::UnknownField
                | ErrorCode::UnknownRootField
                | ErrorCode::UnknownArgument
                | ErrorCode::InvalidArgument
                | ErrorCode::InvalidSelection
                | ErrorCode::CycleDepthExceeded
        )
    }

    /// Check if this is a loader failure.
    pub fn is_loader_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::LoaderUnavailable | ErrorCode::InvalidRow
        )
    }

    /// Check if the resolution was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref path) = self.context.path {
            output.push_str(&format!("  → Path: {}\n", path));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnknownField.code(), "S1001");
        assert_eq!(ErrorCode::LoaderUnavailable.code(), "S3001");
        assert_eq!(ErrorCode::Cancelled.code(), "S5001");
    }

    #[test]
    fn test_unknown_field_error() {
        let err = QueryError::unknown_field("User", "email");
        assert!(err.is_validation_error());
        assert_eq!(err.context.entity.as_deref(), Some("User"));
        assert_eq!(err.context.field.as_deref(), Some("email"));
        assert_eq!(err.to_string(), "[S1001] Cannot query field `email` on type `User`");
    }

    #[test]
    fn test_loader_error_is_not_validation() {
        let err = QueryError::loader_unavailable("User.followers", "connection refused");
        assert!(err.is_loader_error());
        assert!(!err.is_validation_error());
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn test_depth_exceeded() {
        let err = QueryError::depth_exceeded(9, 4);
        assert_eq!(err.code, ErrorCode::CycleDepthExceeded);
        assert!(err.message.contains('9'));
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::unknown_field("Post", "title").with_path("posts.title");

        let output = err.display_full();
        assert!(output.contains("S1001"));
        assert!(output.contains("Entity: Post"));
        assert!(output.contains("Path: posts.title"));
        assert!(output.contains("Suggestions"));
    }

    #[test]
    fn test_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = QueryError::loader_unavailable("User.likes", "io").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
