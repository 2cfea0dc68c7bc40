//! Schema composition.
//!
//! The [`SchemaComposer`] is the single point of contact with the database
//! layer. Built exactly once from an [`Environment`] and a point-in-time
//! catalog snapshot, it merges every module's entities into one
//! [`UnifiedSchema`], applies module table-name prefixing, fixes the
//! construction strategy per entity, and owns the connection pool and
//! transaction coordinator. Every accessor is read-only: rebuilding the
//! schema means constructing a new composer.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Transaction;

use crate::config::Environment;
use crate::construct::{EntityFactory, Materializer};
use crate::entity::{EntityDef, EntityInstance, EntityRef};
use crate::error::OrmError;
use crate::pool::{create_pool, DbPool, PoolSettings};
use crate::registry::{ModuleRegistry, RegistryCatalog};

/// Configuration key holding the database connection URL.
pub const DATASOURCE_URL_KEY: &str = "datasource.url";

/// Configuration key holding the SQL dialect identifier.
pub const DIALECT_KEY: &str = "orm.dialect";

const POOL_MAX_SIZE_KEY: &str = "datasource.pool_max_size";
const BUSY_TIMEOUT_KEY: &str = "datasource.busy_timeout_ms";

/// Reserved prefix for framework-level settings forwarded to every pooled
/// connection as pragmas.
pub const PRAGMA_PREFIX: &str = "sqlite.pragma.";

/// Substring marking a connection URL as an in-memory target.
const IN_MEMORY_MARKER: &str = "mem";

/// The active SQL dialect, identified by a dot-separated name such as
/// `plinth.dialect.Sqlite`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    identifier: String,
}

impl Dialect {
    /// The full dot-separated identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The short name: the last dot-separated segment of the identifier.
    pub fn short_name(&self) -> &str {
        self.identifier
            .rsplit('.')
            .next()
            .unwrap_or(&self.identifier)
    }
}

/// The resolved mapping of one entity type onto its table.
pub struct TableBinding {
    table_name: String,
    owning_module: String,
    entity: EntityDef,
    materializer: Materializer,
}

impl TableBinding {
    /// The effective table name, module prefix applied.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The id of the module that contributed this entity.
    pub fn owning_module(&self) -> &str {
        &self.owning_module
    }

    /// The entity definition behind this binding.
    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    /// The construction path fixed for this entity at composition time.
    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Produces a new, unpopulated instance of this entity.
    pub fn materialize(&self) -> EntityInstance {
        self.materializer.materialize()
    }
}

/// The merged schema: every registered entity bound to its table.
///
/// Iteration order is deterministic (sorted by effective table name).
/// Immutable after composition.
pub struct UnifiedSchema {
    ordered: Vec<TableBinding>,
    by_type: HashMap<TypeId, usize>,
}

impl UnifiedSchema {
    fn compose(registries: &[ModuleRegistry]) -> Result<Self, OrmError> {
        let mut owners: HashMap<TypeId, &str> = HashMap::new();
        let mut tables: HashMap<String, &'static str> = HashMap::new();
        let mut ordered = Vec::new();

        for registry in registries {
            for def in registry.entities() {
                let entity = def.entity();

                if let Some(first) = owners.insert(entity.type_id(), registry.module_id()) {
                    return Err(OrmError::AmbiguousEntity {
                        entity: entity.type_name(),
                        first: first.to_string(),
                        second: registry.module_id().to_string(),
                    });
                }

                let table_name = effective_table_name(registry.module_id(), def.base_table());
                if let Some(first) = tables.insert(table_name.clone(), entity.type_name()) {
                    return Err(OrmError::TableCollision {
                        table: table_name,
                        first,
                        second: entity.type_name(),
                    });
                }

                let materializer = match registry.factory_for(entity) {
                    Some(factory) => Materializer::Factory(factory),
                    None => def
                        .default_construct()
                        .map(Materializer::DefaultConstruct)
                        .ok_or(OrmError::NoConstructionPath(entity.type_name()))?,
                };

                ordered.push(TableBinding {
                    table_name,
                    owning_module: registry.module_id().to_string(),
                    entity: def.clone(),
                    materializer,
                });
            }
        }

        ordered.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        let by_type = ordered
            .iter()
            .enumerate()
            .map(|(index, binding)| (binding.entity.entity().type_id(), index))
            .collect();

        Ok(Self { ordered, by_type })
    }

    /// The binding for the given entity type.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownEntity` if the type is not part of the
    /// schema.
    pub fn binding(&self, entity: EntityRef) -> Result<&TableBinding, OrmError> {
        self.by_type
            .get(&entity.type_id())
            .map(|&index| &self.ordered[index])
            .ok_or(OrmError::UnknownEntity(entity.type_name()))
    }

    /// All bindings, sorted by effective table name.
    pub fn bindings(&self) -> impl Iterator<Item = &TableBinding> {
        self.ordered.iter()
    }

    /// The number of bound entities.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn effective_table_name(module_id: &str, base_table: &str) -> String {
    if module_id.trim().is_empty() {
        base_table.to_string()
    } else {
        format!("{module_id}_{base_table}")
    }
}

/// Runs statement batches inside a single transaction.
///
/// One checkout from the pool, one transaction per call: the closure's
/// error rolls the transaction back, success commits once at the end.
pub struct TransactionCoordinator {
    pool: DbPool,
}

impl TransactionCoordinator {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Executes `work` inside one transaction on one pooled connection.
    ///
    /// # Errors
    ///
    /// Any error from `work` rolls the transaction back and is returned;
    /// pool checkout and commit failures are returned as-is. No partial
    /// work is ever committed.
    pub fn in_transaction<T, F>(&self, work: F) -> Result<T, OrmError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, rusqlite::Error>,
    {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        // Dropping `tx` without commit rolls back.
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// The composed, immutable persistence component.
pub struct SchemaComposer {
    url: String,
    dialect: Dialect,
    schema: UnifiedSchema,
    pool: DbPool,
    coordinator: TransactionCoordinator,
}

impl SchemaComposer {
    /// Composes the unified schema from a catalog snapshot and builds the
    /// connection pool and transaction coordinator.
    ///
    /// # Errors
    ///
    /// Fails fast with a configuration error if the catalog is empty, a
    /// required configuration key is missing, an entity is claimed by more
    /// than one module, two entities collide on a table name, or an entity
    /// has no construction path.
    pub fn new(environment: &Environment, catalog: &RegistryCatalog) -> Result<Self, OrmError> {
        let registries = catalog.snapshot();
        if registries.is_empty() {
            return Err(OrmError::Config(
                "no module registries have been registered".to_string(),
            ));
        }

        let url = required(environment, DATASOURCE_URL_KEY)?.to_string();
        let dialect = Dialect {
            identifier: required(environment, DIALECT_KEY)?.to_string(),
        };

        let schema = UnifiedSchema::compose(&registries)?;
        tracing::info!(
            modules = registries.len(),
            entities = schema.len(),
            "composed unified schema"
        );

        let settings = pool_settings(environment)?;
        let pragmas: Vec<(String, String)> = environment
            .keys_with_prefix(PRAGMA_PREFIX)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let pool = create_pool(&url, settings, pragmas)?;
        let coordinator = TransactionCoordinator::new(pool.clone());

        Ok(Self {
            url,
            dialect,
            schema,
            pool,
            coordinator,
        })
    }

    /// The connection pool. Safe for unsynchronized concurrent use.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The transaction coordinator bound to this composer's pool.
    pub fn transaction_coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// The unified schema.
    pub fn schema(&self) -> &UnifiedSchema {
        &self.schema
    }

    /// Whether the configured connection URL names an in-memory target.
    pub fn is_in_memory_target(&self) -> bool {
        self.url.contains(IN_MEMORY_MARKER)
    }

    /// The active dialect.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The full dialect identifier.
    pub fn dialect_name(&self) -> &str {
        self.dialect.identifier()
    }

    /// The effective table name for the given entity type.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownEntity` if the type is not part of the
    /// schema.
    pub fn table_name_for(&self, entity: EntityRef) -> Result<&str, OrmError> {
        Ok(self.schema.binding(entity)?.table_name())
    }

    /// The construction factory registered for the given entity type, or
    /// `None` if the entity uses default construction or is unknown.
    pub fn factory_for(&self, entity: EntityRef) -> Option<Arc<dyn EntityFactory>> {
        self.schema
            .binding(entity)
            .ok()
            .and_then(|binding| binding.materializer().factory().cloned())
    }

    /// Materializes a new, unpopulated instance of the given entity type.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownEntity` if the type is not part of the
    /// schema.
    pub fn materialize(&self, entity: EntityRef) -> Result<EntityInstance, OrmError> {
        Ok(self.schema.binding(entity)?.materialize())
    }

    /// Materializes and downcasts a new instance of `T`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownEntity` if `T` is not part of the schema,
    /// or a configuration error if its factory produced a different type.
    pub fn instantiate<T: Send + 'static>(&self) -> Result<Box<T>, OrmError> {
        let entity = EntityRef::of::<T>();
        let instance = self.materialize(entity)?;
        instance.downcast::<T>().map_err(|_| {
            OrmError::Config(format!(
                "factory for entity '{}' produced a foreign type",
                entity.type_name()
            ))
        })
    }
}

fn required<'a>(environment: &'a Environment, key: &str) -> Result<&'a str, OrmError> {
    environment
        .get(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| OrmError::Config(format!("missing required configuration key '{key}'")))
}

fn pool_settings(environment: &Environment) -> Result<PoolSettings, OrmError> {
    let mut settings = PoolSettings::default();
    if let Some(value) = environment.get(BUSY_TIMEOUT_KEY) {
        settings.busy_timeout_ms = value.parse().map_err(|_| {
            OrmError::Config(format!("invalid '{BUSY_TIMEOUT_KEY}' value: {value}"))
        })?;
    }
    if let Some(value) = environment.get(POOL_MAX_SIZE_KEY) {
        settings.max_size = value.parse().map_err(|_| {
            OrmError::Config(format!("invalid '{POOL_MAX_SIZE_KEY}' value: {value}"))
        })?;
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ColumnDef;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Person {
        _name: String,
    }

    #[derive(Default)]
    struct Pet {
        _nick: String,
    }

    struct Place {
        service: &'static str,
    }

    struct PlaceFactory;

    impl EntityFactory for PlaceFactory {
        fn create(&self) -> EntityInstance {
            Box::new(Place {
                service: "injected service",
            })
        }
    }

    fn unique_memory_url() -> String {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("file:composer_test_{n}?mode=memory&cache=shared")
    }

    fn environment(url: &str) -> Environment {
        Environment::from_pairs([
            (DATASOURCE_URL_KEY, url),
            (DIALECT_KEY, "plinth.dialect.Sqlite"),
        ])
    }

    fn person_def() -> EntityDef {
        EntityDef::of::<Person>("persons")
            .column(ColumnDef::new("id", "integer").primary_key())
            .column(ColumnDef::new("name", "text").not_null())
    }

    #[test]
    fn table_names_are_prefixed_with_the_module_id() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));
        catalog.register(
            ModuleRegistry::new("m2").entity(
                EntityDef::of::<Pet>("pets").column(ColumnDef::new("id", "integer").primary_key()),
            ),
        );

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");

        assert_eq!(
            composer
                .table_name_for(EntityRef::of::<Person>())
                .expect("person should be bound"),
            "m1_persons"
        );
        assert_eq!(
            composer
                .table_name_for(EntityRef::of::<Pet>())
                .expect("pet should be bound"),
            "m2_pets"
        );
    }

    #[test]
    fn blank_module_id_leaves_table_names_unprefixed() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("").entity(person_def()));

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");

        assert_eq!(
            composer
                .table_name_for(EntityRef::of::<Person>())
                .expect("person should be bound"),
            "persons"
        );
    }

    #[test]
    fn ambiguous_entity_ownership_fails_composition() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));
        catalog.register(ModuleRegistry::new("m2").entity(person_def()));

        let url = unique_memory_url();
        let err = SchemaComposer::new(&environment(&url), &catalog)
            .err()
            .expect("composition should fail");
        assert!(matches!(err, OrmError::AmbiguousEntity { .. }));
    }

    #[test]
    fn table_name_collision_fails_composition() {
        let catalog = RegistryCatalog::new();
        catalog.register(
            ModuleRegistry::new("m1")
                .entity(person_def())
                .entity(EntityDef::of::<Pet>("persons")),
        );

        let url = unique_memory_url();
        let err = SchemaComposer::new(&environment(&url), &catalog)
            .err()
            .expect("composition should fail");
        assert!(matches!(err, OrmError::TableCollision { .. }));
    }

    #[test]
    fn entity_without_construction_path_fails_composition() {
        struct Orphan;
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(EntityDef::external::<Orphan>("orphans")));

        let url = unique_memory_url();
        let err = SchemaComposer::new(&environment(&url), &catalog)
            .err()
            .expect("composition should fail");
        assert!(matches!(err, OrmError::NoConstructionPath(_)));
    }

    #[test]
    fn empty_catalog_fails_composition() {
        let catalog = RegistryCatalog::new();
        let url = unique_memory_url();
        let err = SchemaComposer::new(&environment(&url), &catalog)
            .err()
            .expect("composition should fail");
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn factory_entities_materialize_through_their_factory() {
        let catalog = RegistryCatalog::new();
        catalog.register(
            ModuleRegistry::new("m1")
                .entity(person_def())
                .entity_with_factory(
                    EntityDef::external::<Place>("places"),
                    Arc::new(PlaceFactory),
                ),
        );

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");

        // Factory-backed entity: the registered factory is consulted.
        assert!(composer.factory_for(EntityRef::of::<Place>()).is_some());
        let place = composer
            .instantiate::<Place>()
            .expect("place should materialize");
        assert_eq!(place.service, "injected service");

        // Default-constructible entity: no factory, default path.
        assert!(composer.factory_for(EntityRef::of::<Person>()).is_none());
        composer
            .instantiate::<Person>()
            .expect("person should materialize");
    }

    #[test]
    fn unknown_entity_lookups_fail() {
        struct Stranger;
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");

        let err = composer
            .table_name_for(EntityRef::of::<Stranger>())
            .err()
            .expect("lookup should fail");
        assert!(matches!(err, OrmError::UnknownEntity(_)));
    }

    #[test]
    fn in_memory_detection_inspects_the_url() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");
        assert!(composer.is_in_memory_target());
    }

    #[test]
    fn dialect_short_name_is_the_last_segment() {
        let dialect = Dialect {
            identifier: "org.vendor.FooDialect".to_string(),
        };
        assert_eq!(dialect.short_name(), "FooDialect");

        let plain = Dialect {
            identifier: "sqlite".to_string(),
        };
        assert_eq!(plain.short_name(), "sqlite");
    }

    #[test]
    fn missing_required_keys_fail_composition() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));

        let env = Environment::from_pairs([(DIALECT_KEY, "plinth.dialect.Sqlite")]);
        let err = SchemaComposer::new(&env, &catalog)
            .err()
            .expect("composition should fail without a datasource url");
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn coordinator_rolls_back_on_error() {
        let catalog = RegistryCatalog::new();
        catalog.register(ModuleRegistry::new("m1").entity(person_def()));

        let url = unique_memory_url();
        let composer =
            SchemaComposer::new(&environment(&url), &catalog).expect("composition should succeed");

        let result = composer.transaction_coordinator().in_transaction(|tx| {
            tx.execute_batch("CREATE TABLE rollback_probe (id INTEGER PRIMARY KEY);")?;
            tx.execute_batch("THIS IS NOT SQL;")
        });
        assert!(result.is_err());

        let conn = composer.pool().get().expect("should get a connection");
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'rollback_probe')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(!exists, "failed transaction should leave no side effects");
    }
}
