//! Database provisioning utility.
//!
//! Administrative, destructive operations for development and test
//! databases: bulk delete, full schema regeneration, schema-script
//! generation, and SQL script/command execution. Every destructive
//! operation first passes the production-safety check: in-memory targets
//! pass unconditionally, anything else must carry the opt-in marker row
//! (see [`DatabaseUtility::verify_destructive_target`]).

use std::path::{Path, PathBuf};

use plinth_orm::{EntityRef, SchemaComposer};

use crate::ddl;
use crate::error::ToolsError;
use crate::script;

/// The well-known marker table proving a database may be destroyed.
pub const MARKER_TABLE: &str = "test_marker";

const MARKER_COLUMN: &str = "drop_database";
const MARKER_SENTINEL: &str = "YES, DROP ME";
const DIALECT_PLACEHOLDER: &str = "{dialect}";

/// Outcome of a passing production-safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// The connection URL names an in-memory target; assumed
    /// development-only.
    InMemoryTarget,
    /// The marker table holds the exact sentinel row.
    MarkerPresent,
}

/// Utility to manage databases in development and test environments.
pub struct DatabaseUtility<'a> {
    composer: &'a SchemaComposer,
}

impl<'a> DatabaseUtility<'a> {
    /// Creates a utility bound to the given composer.
    pub fn new(composer: &'a SchemaComposer) -> Self {
        Self { composer }
    }

    /// Deletes all rows of the given entities, as one batch in one
    /// transaction. Requires the production-safety check to pass.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `entities` is empty or contains a
    /// type unknown to the schema, a safety-gate error if the target is
    /// not provably destroyable, or the underlying database error on
    /// execution failure (after full rollback).
    pub fn delete(&self, entities: &[EntityRef]) -> Result<(), ToolsError> {
        if entities.is_empty() {
            return Err(ToolsError::Config("no entities to delete".to_string()));
        }
        self.verify_destructive_target()?;

        let statements = entities
            .iter()
            .map(|entity| {
                let table = self.composer.table_name_for(*entity)?;
                Ok(format!("delete from {table}"))
            })
            .collect::<Result<Vec<_>, ToolsError>>()?;

        self.execute_batch(&statements)
    }

    /// Drops and recreates every table of the unified schema directly
    /// against the live connection. Requires the production-safety check.
    ///
    /// Halts immediately on the first DDL error: a half-regenerated schema
    /// is an unrecoverable state requiring operator intervention, so no
    /// rollback is attempted.
    ///
    /// # Errors
    ///
    /// Returns a safety-gate error or the first failing DDL statement's
    /// database error.
    pub fn regenerate_schema(&self) -> Result<(), ToolsError> {
        self.verify_destructive_target()?;

        let conn = self.composer.pool().get()?;
        let schema = self.composer.schema();
        for statement in ddl::drop_statements(schema)
            .into_iter()
            .chain(ddl::create_statements(schema))
        {
            conn.execute_batch(&statement)?;
        }

        tracing::info!(tables = schema.len(), "regenerated database schema");
        Ok(())
    }

    /// Writes the schema-creation DDL to a file instead of executing it.
    ///
    /// A `{dialect}` placeholder in `path` is replaced with the short name
    /// of the active dialect (the last dot-separated segment of its
    /// identifier). Any pre-existing file at the resolved path is deleted
    /// first; missing parent directories are created. Does not require the
    /// safety check.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty path, or an io error if
    /// the file cannot be prepared or written.
    pub fn generate_schema_script(&self, path: &str) -> Result<PathBuf, ToolsError> {
        if path.trim().is_empty() {
            return Err(ToolsError::Config(
                "schema file name is null or empty".to_string(),
            ));
        }

        let resolved = PathBuf::from(
            path.replace(DIALECT_PLACEHOLDER, self.composer.dialect().short_name()),
        );
        prepare_file_environment(&resolved)?;

        let mut script = ddl::create_statements(self.composer.schema()).join("\n\n");
        script.push('\n');
        std::fs::write(&resolved, script)?;

        tracing::info!(file = %resolved.display(), "generated schema script");
        Ok(resolved)
    }

    /// Runs the SQL statements stored in a script file, or in every
    /// `*.sql` file of a directory in lexicographic filename order.
    ///
    /// A path that does not exist is logged and treated as a no-op.
    ///
    /// # Errors
    ///
    /// Returns an io error if a script cannot be read, or the database
    /// error of the first failing batch (each file is its own
    /// transaction).
    pub fn run_sql_script(&self, path: impl AsRef<Path>) -> Result<(), ToolsError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "sql script file or directory does not exist"
            );
            return Ok(());
        }

        if path.is_dir() {
            let mut scripts: Vec<PathBuf> = std::fs::read_dir(path)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "sql"))
                .collect();
            scripts.sort();
            for script_path in scripts {
                self.run_script_file(&script_path)?;
            }
            Ok(())
        } else {
            self.run_script_file(path)
        }
    }

    fn run_script_file(&self, path: &Path) -> Result<(), ToolsError> {
        tracing::debug!(script = %path.display(), "running sql script");
        let statements = script::parse_script(path)?;
        let refs: Vec<&str> = statements.iter().map(String::as_str).collect();
        self.run_sql_commands(&refs)
    }

    /// Executes the given statements as one batch inside one transaction,
    /// unescaping backslash-style literal escape sequences first.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty statement list, or the
    /// underlying database error on any execution failure (after full
    /// rollback of the batch).
    pub fn run_sql_commands<S: AsRef<str>>(&self, statements: &[S]) -> Result<(), ToolsError> {
        if statements.is_empty() {
            return Err(ToolsError::Config("no statements to run".to_string()));
        }

        let unescaped: Vec<String> = statements
            .iter()
            .map(|statement| script::unescape_literals(statement.as_ref()))
            .collect();
        self.execute_batch(&unescaped)
    }

    /// The production-safety check guarding destructive operations.
    ///
    /// In-memory targets pass unconditionally. Otherwise the marker table
    /// must hold exactly the expected sentinel row.
    ///
    /// # Errors
    ///
    /// Returns `ToolsError::SafetyGate` (with remediation statements) if
    /// the sentinel row is absent or wrong, or
    /// `ToolsError::MarkerProbeFailed` if the probe query itself fails —
    /// most likely because the marker table does not exist.
    pub fn verify_destructive_target(&self) -> Result<SafetyVerdict, ToolsError> {
        if self.composer.is_in_memory_target() {
            // In-memory data sources are never used in production.
            return Ok(SafetyVerdict::InMemoryTarget);
        }

        tracing::debug!("verifying that this is a destroyable database");
        let conn = self.composer.pool().get()?;
        let probe = format!("select {MARKER_COLUMN} from {MARKER_TABLE}");

        match conn.query_row(&probe, [], |row| row.get::<_, String>(0)) {
            Ok(value) if value == MARKER_SENTINEL => Ok(SafetyVerdict::MarkerPresent),
            Ok(_) => Err(ToolsError::SafetyGate(format!(
                "marker table does not contain the expected sentinel row; \
                 if this database is safe to destroy, create it with:\n{}",
                remediation()
            ))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(ToolsError::SafetyGate(format!(
                "marker table does not contain a row; \
                 if this database is safe to destroy, create it with:\n{}",
                remediation()
            ))),
            Err(source) => {
                tracing::error!(
                    error = %source,
                    "marker table probe failed, most likely the table does not exist"
                );
                tracing::error!("create it with:\n{}", remediation());
                Err(ToolsError::MarkerProbeFailed {
                    source,
                    remediation: remediation(),
                })
            }
        }
    }

    fn execute_batch(&self, statements: &[String]) -> Result<(), ToolsError> {
        self.composer
            .transaction_coordinator()
            .in_transaction(|tx| {
                for statement in statements {
                    tx.execute_batch(statement)?;
                }
                Ok(())
            })
            .map_err(ToolsError::from)
    }
}

/// The exact statements that create the marker table and sentinel row.
pub fn remediation() -> String {
    format!(
        "create table {MARKER_TABLE} ({MARKER_COLUMN} varchar (50));\n\
         insert into {MARKER_TABLE} values ('{MARKER_SENTINEL}');"
    )
}

// If the file already exists, delete it. If the path to the file doesn't
// exist, create it.
fn prepare_file_environment(path: &Path) -> Result<(), ToolsError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    } else if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
