//! Connection pool creation and configuration.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::error::OrmError;

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub max_size: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            max_size: 8,
        }
    }
}

/// Creates a new SQLite connection pool for the given connection URL.
///
/// `url` may be a file path, `:memory:`, or a `file:` URI (URI mode is
/// enabled automatically for the latter, which is how shared-cache
/// in-memory databases are addressed). `pragmas` are applied to every
/// connection the pool hands out, alongside the busy timeout.
///
/// # Errors
///
/// Returns `OrmError::Pool` if the connection pool cannot be created.
pub(crate) fn create_pool(
    url: &str,
    settings: PoolSettings,
    pragmas: Vec<(String, String)>,
) -> Result<DbPool, OrmError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    if url.starts_with("file:") {
        flags |= OpenFlags::SQLITE_OPEN_URI;
    }

    let mut init_sql = format!("PRAGMA busy_timeout = {};", settings.busy_timeout_ms);
    for (name, value) in &pragmas {
        init_sql.push_str(&format!("\nPRAGMA {name} = {value};"));
    }

    let manager = SqliteConnectionManager::file(url)
        .with_flags(flags)
        .with_init(move |conn| conn.execute_batch(&init_sql));

    let pool = Pool::builder()
        .max_size(settings.max_size)
        .build(manager)
        .map_err(OrmError::Pool)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_in_memory_pool_applies_settings() {
        let settings = PoolSettings {
            busy_timeout_ms: 2_500,
            max_size: 3,
        };
        let pragmas = vec![("foreign_keys".to_string(), "ON".to_string())];

        let pool =
            create_pool(":memory:", settings, pragmas).expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        let busy_timeout: i32 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 2_500, "busy timeout should match settings");

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert_eq!(fk, 1, "configured pragma should be applied");

        assert_eq!(pool.max_size(), 3, "pool max size should match settings");
    }

    #[test]
    fn shared_cache_uri_pool_sees_one_database() {
        let pool = create_pool(
            "file:pool_shared_cache_test?mode=memory&cache=shared",
            PoolSettings::default(),
            Vec::new(),
        )
        .expect("pool creation should succeed");

        let writer = pool.get().expect("should get writer connection");
        writer
            .execute_batch("CREATE TABLE probe (id INTEGER PRIMARY KEY);")
            .expect("should create table");

        let reader = pool.get().expect("should get reader connection");
        let exists: bool = reader
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'probe')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(exists, "second connection should see the shared database");
    }
}
