//! Error types for the persistence core.

/// Errors raised while composing the unified schema or using its
/// read-only capabilities.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// A required argument or configuration value is missing or invalid.
    #[error("persistence configuration error: {0}")]
    Config(String),

    /// An entity type is claimed by more than one module registry.
    #[error("entity '{entity}' is claimed by both module '{first}' and module '{second}'")]
    AmbiguousEntity {
        /// Type name of the contested entity.
        entity: &'static str,
        /// Module that claimed the entity first.
        first: String,
        /// Module that claimed it again.
        second: String,
    },

    /// An entity type is not bound in the unified schema.
    #[error("entity '{0}' is not bound to any registered module")]
    UnknownEntity(&'static str),

    /// Two entities resolved to the same effective table name.
    #[error("entities '{first}' and '{second}' both map to table '{table}'")]
    TableCollision {
        /// The colliding effective table name.
        table: String,
        /// Type name of the entity that claimed the table first.
        first: &'static str,
        /// Type name of the entity that collided with it.
        second: &'static str,
    },

    /// An entity is neither default-constructible nor covered by a factory.
    #[error("entity '{0}' has no default constructor and no registered factory")]
    NoConstructionPath(&'static str),

    /// Failed to create or check out from the connection pool.
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
