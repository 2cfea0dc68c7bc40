//! Database provisioning tools for the Plinth persistence core.
//!
//! Builds on [`plinth_orm`]'s composed schema to provide scriptable,
//! destructive database management for development and test environments:
//!
//! - [`DatabaseUtility`] — bulk delete, schema regeneration, schema-script
//!   generation, and SQL script/command execution, gated by a
//!   production-safety check (in-memory targets pass; anything else must
//!   carry the `test_marker` sentinel row).
//! - [`script`] — the line-oriented SQL statement splitter.
//! - [`ddl`] — `create`/`drop` DDL rendering from the unified schema.

pub mod ddl;
mod error;
pub mod script;
mod utility;

pub use error::ToolsError;
pub use utility::{remediation, DatabaseUtility, SafetyVerdict, MARKER_TABLE};
