//! Error types for SQLite operations.

use thiserror::Error;

use strata_query::QueryError;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The schema describes something the database cannot serve.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column held a value that cannot become a key.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// Convert into the resolver's error for a failed fetch of `name`
    /// (a root field or `Source.field`).
    ///
    /// Driver and connection failures become `LoaderUnavailable` so the
    /// resolver can null the affected branch and carry on.
    pub fn into_query_error(self, name: &str) -> QueryError {
        match self {
            Self::Sqlite(_) | Self::Connection(_) => {
                QueryError::loader_unavailable(name, self.to_string()).with_source(self)
            }
            Self::TypeConversion(msg) => QueryError::invalid_row(msg),
            Self::Config(msg) | Self::Schema(msg) => {
                QueryError::internal(format!("`{}`: {}", name, msg))
            }
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        err.into_query_error("sqlite")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_query::ErrorCode;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("invalid path");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("invalid path"));
    }

    #[test]
    fn test_driver_failure_is_loader_unavailable() {
        let err = SqliteError::from(rusqlite::Error::InvalidQuery);
        let query_err = err.into_query_error("User.followers");
        assert_eq!(query_err.code, ErrorCode::LoaderUnavailable);
        assert!(query_err.message.contains("User.followers"));
        assert!(query_err.is_loader_error());
    }

    #[test]
    fn test_connection_failure_is_loader_unavailable() {
        let query_err: QueryError = SqliteError::connection("closed").into();
        assert_eq!(query_err.code, ErrorCode::LoaderUnavailable);
    }

    #[test]
    fn test_type_conversion_is_invalid_row() {
        let query_err = SqliteError::type_conversion("null key").into_query_error("users");
        assert_eq!(query_err.code, ErrorCode::InvalidRow);
    }
}
