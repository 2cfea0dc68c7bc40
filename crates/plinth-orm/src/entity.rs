//! Entity metadata definitions.
//!
//! An [`EntityDef`] describes one persisted type: its [`TypeId`] key, the
//! base table name it maps to, its column layout, and whether the type can
//! be built through default construction. Modules contribute these
//! definitions through their registries; the schema composer turns them
//! into table bindings.

use std::any::{Any, TypeId};

/// A materialized, not-yet-populated entity object.
pub type EntityInstance = Box<dyn Any + Send>;

/// A lightweight handle identifying one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    type_id: TypeId,
    type_name: &'static str,
}

impl EntityRef {
    /// Returns the handle for the entity type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` this handle identifies.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The fully qualified type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// One column of an entity's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: &'static str,
    sql_type: &'static str,
    primary_key: bool,
    nullable: bool,
}

impl ColumnDef {
    /// Creates a nullable, non-key column.
    pub fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            nullable: true,
        }
    }

    /// Marks this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks this column as `not null`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// The column name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The SQL type as written into DDL.
    pub fn sql_type(&self) -> &'static str {
        self.sql_type
    }

    /// Whether this column is the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether this column accepts nulls.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Metadata for one persisted entity type.
#[derive(Clone)]
pub struct EntityDef {
    entity: EntityRef,
    table: &'static str,
    columns: Vec<ColumnDef>,
    default_construct: Option<fn() -> EntityInstance>,
}

impl EntityDef {
    /// Defines a default-constructible entity mapped to `table`.
    pub fn of<T>(table: &'static str) -> Self
    where
        T: Default + Send + 'static,
    {
        Self {
            entity: EntityRef::of::<T>(),
            table,
            columns: Vec::new(),
            default_construct: Some(|| Box::new(T::default())),
        }
    }

    /// Defines an entity with no default construction path. Composition
    /// fails unless its module registers a construction factory for it.
    pub fn external<T>(table: &'static str) -> Self
    where
        T: Send + 'static,
    {
        Self {
            entity: EntityRef::of::<T>(),
            table,
            columns: Vec::new(),
            default_construct: None,
        }
    }

    /// Appends a column definition.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// The entity type this definition describes.
    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    /// The unprefixed table name.
    pub fn base_table(&self) -> &'static str {
        self.table
    }

    /// The column layout, in declaration order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub(crate) fn default_construct(&self) -> Option<fn() -> EntityInstance> {
        self.default_construct
    }
}

impl std::fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDef")
            .field("entity", &self.entity.type_name)
            .field("table", &self.table)
            .field("columns", &self.columns.len())
            .field("default_constructible", &self.default_construct.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample {
        _id: i64,
    }

    #[test]
    fn default_entity_constructs_instances() {
        let def = EntityDef::of::<Sample>("samples")
            .column(ColumnDef::new("id", "integer").primary_key());

        let construct = def.default_construct().expect("should have default path");
        let instance = construct();
        assert!(instance.downcast::<Sample>().is_ok());
    }

    #[test]
    fn external_entity_has_no_default_path() {
        struct NoDefault;
        let def = EntityDef::external::<NoDefault>("no_defaults");
        assert!(def.default_construct().is_none());
    }

    #[test]
    fn column_modifiers_apply() {
        let col = ColumnDef::new("email", "text").not_null();
        assert_eq!(col.name(), "email");
        assert_eq!(col.sql_type(), "text");
        assert!(!col.is_primary_key());
        assert!(!col.is_nullable());
    }
}
