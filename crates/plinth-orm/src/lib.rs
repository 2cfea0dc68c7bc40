//! Modular persistence core for the Plinth platform.
//!
//! Independently configured application modules each contribute a
//! [`ModuleRegistry`] of persisted entity types (and optional construction
//! factories for types that need injected collaborators). A
//! [`RegistryCatalog`] collects those registries while modules initialize;
//! the [`SchemaComposer`] then merges them — exactly once — into a single
//! [`UnifiedSchema`] with module-prefixed table names, a shared connection
//! pool, and a transaction coordinator.
//!
//! # Design decisions
//!
//! - **Explicit catalog, no globals**: the catalog is an ordinary object
//!   handed to each module-configuration step and to the composer, so tests
//!   can build isolated catalogs per run.
//! - **Construction fixed at composition time**: each entity's
//!   [`Materializer`] (registered factory or default construction) is
//!   selected once while composing and stored in its table binding, not
//!   discovered through runtime introspection.
//! - **Compose once, read forever**: the composer is immutable after
//!   construction and safe for unsynchronized concurrent reads; rebuilding
//!   the schema means building a new composer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use plinth_orm::{
//!     ColumnDef, EntityDef, Environment, ModuleRegistry, RegistryCatalog, SchemaComposer,
//! };
//!
//! let catalog = RegistryCatalog::new();
//! catalog.register(
//!     ModuleRegistry::new("login").entity(
//!         EntityDef::of::<UserRole>("user_roles")
//!             .column(ColumnDef::new("id", "integer").primary_key())
//!             .column(ColumnDef::new("role", "text").not_null()),
//!     ),
//! );
//!
//! let environment = Environment::from_toml_file("orm.toml")?;
//! let composer = SchemaComposer::new(&environment, &catalog)?;
//! // `login_user_roles` is the effective table name.
//! ```

mod composer;
mod config;
mod construct;
mod entity;
mod error;
mod pool;
mod registry;

pub use composer::{
    Dialect, SchemaComposer, TableBinding, TransactionCoordinator, UnifiedSchema,
    DATASOURCE_URL_KEY, DIALECT_KEY, PRAGMA_PREFIX,
};
pub use config::{ConfigError, Environment};
pub use construct::{EntityFactory, Materializer};
pub use entity::{ColumnDef, EntityDef, EntityInstance, EntityRef};
pub use error::OrmError;
pub use pool::{DbPool, PoolSettings};
pub use registry::{ModuleRegistry, RegistryCatalog};
