//! Module persistence registries and the process-lifetime catalog.
//!
//! Each application module contributes a [`ModuleRegistry`]: its module id
//! (used to prefix table names), the entity definitions it persists, and
//! optional construction factories for entities that cannot use default
//! construction. Registries are collected in a [`RegistryCatalog`], an
//! explicit append-only set that tolerates concurrent registration while
//! modules initialize in parallel.

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::construct::EntityFactory;
use crate::entity::{EntityDef, EntityRef};

/// One module's persistence contribution.
///
/// Equality, ordering and hashing are defined solely by the module id:
/// two registries with the same id are the same logical entry.
#[derive(Clone)]
pub struct ModuleRegistry {
    module_id: String,
    entities: Vec<EntityDef>,
    factories: HashMap<TypeId, Arc<dyn EntityFactory>>,
}

impl ModuleRegistry {
    /// Creates an empty registry for the given module id. A blank id is
    /// permitted and means the module's tables keep their base names
    /// unprefixed.
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            entities: Vec::new(),
            factories: HashMap::new(),
        }
    }

    /// Adds an entity definition. Adding the same entity type again is a
    /// no-op (set semantics).
    pub fn entity(mut self, def: EntityDef) -> Self {
        if !self.contains(def.entity()) {
            self.entities.push(def);
        }
        self
    }

    /// Adds an entity definition together with its construction factory.
    /// If the entity was already added, only the factory binding is
    /// updated.
    pub fn entity_with_factory(
        mut self,
        def: EntityDef,
        factory: Arc<dyn EntityFactory>,
    ) -> Self {
        let type_id = def.entity().type_id();
        self = self.entity(def);
        self.factories.insert(type_id, factory);
        self
    }

    /// The module id, used as the table-name prefix.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// The entity definitions this module contributes.
    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// Whether this module claims the given entity type.
    pub fn contains(&self, entity: EntityRef) -> bool {
        self.entities
            .iter()
            .any(|def| def.entity().type_id() == entity.type_id())
    }

    /// The construction factory registered for the given entity type, if
    /// any.
    pub fn factory_for(&self, entity: EntityRef) -> Option<Arc<dyn EntityFactory>> {
        self.factories.get(&entity.type_id()).cloned()
    }
}

impl PartialEq for ModuleRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.module_id == other.module_id
    }
}

impl Eq for ModuleRegistry {}

impl PartialOrd for ModuleRegistry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleRegistry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.module_id.cmp(&other.module_id)
    }
}

impl std::hash::Hash for ModuleRegistry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.module_id.hash(state);
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("module_id", &self.module_id)
            .field("entities", &self.entities.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// Append-only collection of module registries, deduplicated by module id.
///
/// Lives for the process lifetime and is safe to register into from
/// multiple module-initialization threads. There is no removal operation.
#[derive(Debug, Default)]
pub struct RegistryCatalog {
    registries: RwLock<BTreeSet<ModuleRegistry>>,
}

impl RegistryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registry with set-insert semantics: if a registry with the
    /// same module id is already present, the existing entry is kept.
    pub fn register(&self, registry: ModuleRegistry) {
        let mut registries = self
            .registries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !registries.insert(registry) {
            tracing::debug!("module already registered, keeping existing entry");
        }
    }

    /// Returns a point-in-time copy of all registries, ordered by module
    /// id.
    pub fn snapshot(&self) -> Vec<ModuleRegistry> {
        self.registries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// The number of registered modules.
    pub fn len(&self) -> usize {
        self.registries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether no module has registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
