//! Error types for hero-query.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to parse schema: {0}")]
    SchemaParse(String),

    #[error("Failed to parse query: {0}")]
    QueryParse(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Ambiguous column '{0}' - exists in multiple tables")]
    AmbiguousColumn(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A statement was rejected by the schema check before it reached the database.
    #[error("Query failed schema validation: {source}\n  sql: {sql}")]
    Validation {
        sql: String,
        #[source]
        source: Box<Error>,
    },

    /// The database could not be reached (bad URL, refused connection, closed pool).
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// The database rejected or failed to run a statement.
    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    /// Formatted output differs from the expected literal.
    #[error("Output mismatch (expected / actual):\n{diff}")]
    AssertionMismatch {
        expected: String,
        actual: String,
        diff: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a driver error as a connectivity failure or a query failure.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::Connection(err),
            other => Error::Query(other),
        }
    }

    /// Returns true for errors raised while reaching the database.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connection_errors() {
        assert!(Error::from_sqlx(sqlx::Error::PoolClosed).is_connection());
        assert!(Error::from_sqlx(sqlx::Error::PoolTimedOut).is_connection());
    }

    #[test]
    fn test_row_errors_are_query_errors() {
        let err = Error::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Query(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_unknown_column_message() {
        let err = Error::UnknownColumn {
            table: "Hero".to_string(),
            column: "Cape".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown column 'Cape' in table 'Hero'");
    }
}
