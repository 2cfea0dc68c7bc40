//! Schema DDL rendering.
//!
//! Renders `create table` and `drop table` statements from the unified
//! schema's column metadata, in deterministic table-name order. Every
//! statement ends with `;` as its last character, matching the format the
//! script splitter accepts.

use plinth_orm::{TableBinding, UnifiedSchema};

/// Renders one `create table` statement per binding, sorted by table name.
pub fn create_statements(schema: &UnifiedSchema) -> Vec<String> {
    schema.bindings().map(render_create).collect()
}

/// Renders one `drop table if exists` statement per binding, sorted by
/// table name.
pub fn drop_statements(schema: &UnifiedSchema) -> Vec<String> {
    schema
        .bindings()
        .map(|binding| format!("drop table if exists {};", binding.table_name()))
        .collect()
}

fn render_create(binding: &TableBinding) -> String {
    let columns: Vec<String> = binding
        .entity()
        .columns()
        .iter()
        .map(|column| {
            let mut rendered = format!("    {} {}", column.name(), column.sql_type());
            if column.is_primary_key() {
                rendered.push_str(" primary key");
            } else if !column.is_nullable() {
                rendered.push_str(" not null");
            }
            rendered
        })
        .collect();

    format!(
        "create table {} (\n{}\n);",
        binding.table_name(),
        columns.join(",\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_orm::{
        ColumnDef, Environment, EntityDef, ModuleRegistry, RegistryCatalog, SchemaComposer,
        DATASOURCE_URL_KEY, DIALECT_KEY,
    };

    #[derive(Default)]
    struct Person;

    #[derive(Default)]
    struct Place;

    fn compose() -> SchemaComposer {
        let catalog = RegistryCatalog::new();
        catalog.register(
            ModuleRegistry::new("m1")
                .entity(
                    EntityDef::of::<Person>("persons")
                        .column(ColumnDef::new("id", "integer").primary_key())
                        .column(ColumnDef::new("name", "text").not_null())
                        .column(ColumnDef::new("e_mail", "text")),
                )
                .entity(
                    EntityDef::of::<Place>("places")
                        .column(ColumnDef::new("code", "text").primary_key()),
                ),
        );
        let environment = Environment::from_pairs([
            (DATASOURCE_URL_KEY, "file:ddl_test?mode=memory&cache=shared"),
            (DIALECT_KEY, "plinth.dialect.Sqlite"),
        ]);
        SchemaComposer::new(&environment, &catalog).expect("composition should succeed")
    }

    #[test]
    fn create_statements_render_columns_and_constraints() {
        let composer = compose();
        let statements = create_statements(composer.schema());

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "create table m1_persons (\n    id integer primary key,\n    name text not null,\n    e_mail text\n);"
        );
        assert_eq!(
            statements[1],
            "create table m1_places (\n    code text primary key\n);"
        );
    }

    #[test]
    fn drop_statements_cover_every_table() {
        let composer = compose();
        let statements = drop_statements(composer.schema());
        assert_eq!(
            statements,
            vec![
                "drop table if exists m1_persons;",
                "drop table if exists m1_places;"
            ]
        );
    }

    #[test]
    fn rendered_ddl_round_trips_through_the_statement_splitter() {
        let composer = compose();
        let script = create_statements(composer.schema()).join("\n\n");
        let reparsed = crate::script::split_statements(&script);
        assert_eq!(reparsed.len(), 2);
    }
}
