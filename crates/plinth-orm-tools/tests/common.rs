//! Shared fixtures: two application modules contributing entities, one of
//! them factory-built.

use std::sync::Arc;

use plinth_orm::{
    ColumnDef, EntityDef, EntityFactory, EntityInstance, Environment, ModuleRegistry,
    RegistryCatalog, SchemaComposer, DATASOURCE_URL_KEY, DIALECT_KEY,
};

#[derive(Default)]
pub struct Account {
    pub email: String,
}

pub struct Invoice {
    pub issued_by: &'static str,
}

#[derive(Default)]
pub struct AuditEvent {
    pub action: String,
}

pub struct InvoiceFactory;

impl EntityFactory for InvoiceFactory {
    fn create(&self) -> EntityInstance {
        Box::new(Invoice {
            issued_by: "billing service",
        })
    }
}

pub fn catalog() -> RegistryCatalog {
    let catalog = RegistryCatalog::new();
    catalog.register(
        ModuleRegistry::new("billing")
            .entity(
                EntityDef::of::<Account>("accounts")
                    .column(ColumnDef::new("id", "integer").primary_key())
                    .column(ColumnDef::new("email", "text").not_null()),
            )
            .entity_with_factory(
                EntityDef::external::<Invoice>("invoices")
                    .column(ColumnDef::new("id", "integer").primary_key())
                    .column(ColumnDef::new("number", "text").not_null()),
                Arc::new(InvoiceFactory),
            ),
    );
    catalog.register(
        ModuleRegistry::new("audit").entity(
            EntityDef::of::<AuditEvent>("events")
                .column(ColumnDef::new("id", "integer").primary_key())
                .column(ColumnDef::new("action", "text").not_null()),
        ),
    );
    catalog
}

pub fn composer_for(url: &str, dialect: &str) -> SchemaComposer {
    let environment =
        Environment::from_pairs([(DATASOURCE_URL_KEY, url), (DIALECT_KEY, dialect)]);
    SchemaComposer::new(&environment, &catalog()).expect("composition should succeed")
}

/// A composer over a shared-cache in-memory database. `name` must be
/// unique per test so parallel tests do not share state.
pub fn memory_composer(name: &str) -> SchemaComposer {
    composer_for(
        &format!("file:{name}?mode=memory&cache=shared"),
        "plinth.dialect.Sqlite",
    )
}

pub fn count_rows(composer: &SchemaComposer, table: &str) -> i64 {
    let conn = composer.pool().get().expect("should get a connection");
    conn.query_row(&format!("select count(*) from {table}"), [], |row| {
        row.get(0)
    })
    .expect("should count rows")
}
