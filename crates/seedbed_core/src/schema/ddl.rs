//! `CREATE TABLE IF NOT EXISTS` rendering for entity types.

use crate::db::{quote_identifier, DbResult};
use crate::model::entity::{Column, EntityType};

/// Renders the idempotent table definition for one entity type.
pub fn create_table_sql(entity_type: &EntityType) -> DbResult<String> {
    let definitions = entity_type
        .columns()
        .iter()
        .map(column_definition)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote_identifier(entity_type.table())?,
        definitions.join(",\n    ")
    ))
}

fn column_definition(column: &Column) -> DbResult<String> {
    let mut definition = format!("{} {}", quote_identifier(&column.name)?, column.kind.sql_name());

    if column.primary_key {
        definition.push_str(" PRIMARY KEY");
        // SQLite lets non-integer primary keys hold NULL unless told otherwise.
        if !column.is_auto_assigned() {
            definition.push_str(" NOT NULL");
        }
    } else if column.not_null {
        definition.push_str(" NOT NULL");
    }
    if column.unique {
        definition.push_str(" UNIQUE");
    }
    if let Some(foreign_key) = &column.foreign_key {
        definition.push_str(&format!(
            " REFERENCES {} ({})",
            quote_identifier(&foreign_key.table)?,
            quote_identifier(&foreign_key.column)?
        ));
    }

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::create_table_sql;
    use crate::model::app_config;
    use crate::model::entity::{Column, EntityType};

    #[test]
    fn renders_app_config_table() {
        let sql = create_table_sql(&app_config::entity_type().unwrap()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"app_configs\" (\n    \
             \"key\" VARCHAR(30) PRIMARY KEY NOT NULL,\n    \
             \"value\" VARCHAR(30) NOT NULL,\n    \
             \"description\" VARCHAR(100) UNIQUE\n);"
        );
    }

    #[test]
    fn renders_integer_primary_key_and_references() {
        let users = EntityType::builder("users")
            .column(Column::integer("id").primary_key())
            .column(Column::integer("role_id").references("roles", "id"))
            .build()
            .unwrap();
        let sql = create_table_sql(&users).unwrap();
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY,"));
        assert!(sql.contains("\"role_id\" INTEGER REFERENCES \"roles\" (\"id\")"));
    }

    #[test]
    fn rendered_sql_is_idempotent_in_sqlite() {
        let sql = create_table_sql(&app_config::entity_type().unwrap()).unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&sql).unwrap();
        conn.execute_batch(&sql).unwrap();
    }
}
