//! Error types for the database tooling layer.

use plinth_orm::OrmError;

/// Errors raised by the database utility and script parser.
#[derive(Debug, thiserror::Error)]
pub enum ToolsError {
    /// A required argument is missing or invalid.
    #[error("database utility configuration error: {0}")]
    Config(String),

    /// The production-safety check refused a destructive operation.
    #[error("destructive operation refused: {0}")]
    SafetyGate(String),

    /// The marker-table probe itself failed (most likely the table does
    /// not exist). Carries the remediation statements alongside the
    /// underlying database error.
    #[error(
        "cannot verify destructive target: {source}\n\
         if this database is safe to destroy, create the marker with:\n{remediation}"
    )]
    MarkerProbeFailed {
        /// The underlying database error from the probe query.
        source: rusqlite::Error,
        /// The exact DDL and DML to create the marker table and sentinel.
        remediation: String,
    },

    /// A script file or output file operation failed.
    #[error("script file error: {0}")]
    Io(#[from] std::io::Error),

    /// An error surfaced from the persistence core.
    #[error(transparent)]
    Orm(#[from] OrmError),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to check out a pooled connection.
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}
