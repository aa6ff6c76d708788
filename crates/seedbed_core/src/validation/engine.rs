//! Validation & resolution engine.

use super::ValidationError;
use crate::db::value::is_empty_value;
use crate::db::Session;
use crate::error::{StoreError, StoreResult};
use crate::model::entity::{ColumnType, Entity, EntityType, Row};
use crate::schema::{ForeignKeyRef, SchemaRegistry};
use log::debug;
use serde_json::Value;

// One extra row is enough to detect a duplicated natural key.
const NATURAL_KEY_LOOKUP_LIMIT: usize = 2;

/// Validates `row` for `table` and builds the entity to persist.
///
/// Steps, in order:
/// 1. Each foreign key: empty natural-key alias ⇒ column set to null;
///    otherwise the referenced row is looked up by natural key and the
///    column takes its referenced-column value. The alias field is removed.
/// 2. Each unique column with a non-empty value must not already exist.
/// 3. Remaining fields must be columns; required columns must be present;
///    bounded text must fit.
///
/// The returned entity is not added to the session.
///
/// # Errors
/// - `ValidationError::NotAValidForeignKey` / `ElementAlreadyExists` and
///   the shape errors, wrapped in `StoreError::Validation`.
/// - `StoreError::AmbiguousNaturalKey` when a natural key matches several rows.
/// - `StoreError::Registry` for unregistered tables, `StoreError::Db` for
///   storage failures.
pub fn validate_and_build(
    registry: &SchemaRegistry,
    table: &str,
    mut row: Row,
    session: &mut Session<'_>,
) -> StoreResult<Entity> {
    let entity_type = registry.entity_type(table)?;

    for foreign_key in registry.resolve_foreign_keys(table)? {
        resolve_foreign_key(table, foreign_key, &mut row, session)?;
    }

    for column in registry.unique_columns(table)? {
        let Some(value) = row.get(column).filter(|value| !is_empty_value(Some(value))) else {
            continue;
        };
        if session.exists(table, column, value)? {
            debug!(
                "event=row_validate module=validation status=rejected table={} column={} error_code=element_already_exists",
                table, column
            );
            return Err(ValidationError::ElementAlreadyExists {
                table: table.to_string(),
                column: column.clone(),
                value: value.clone(),
            }
            .into());
        }
    }

    check_shape(entity_type, &row)?;
    Ok(Entity::new(table, row))
}

fn resolve_foreign_key(
    table: &str,
    foreign_key: &ForeignKeyRef,
    row: &mut Row,
    session: &mut Session<'_>,
) -> StoreResult<()> {
    let supplied = row
        .remove(&foreign_key.alias)
        .filter(|value| !is_empty_value(Some(value)));
    let Some(natural_key) = supplied else {
        row.insert(foreign_key.column.clone(), Value::Null);
        return Ok(());
    };

    let mut matches = session.find_by(
        &foreign_key.referenced_table,
        &foreign_key.referenced_natural_key,
        &natural_key,
        Some(NATURAL_KEY_LOOKUP_LIMIT),
    )?;

    match matches.len() {
        0 => {
            debug!(
                "event=row_validate module=validation status=rejected table={} column={} error_code=not_a_valid_foreign_key",
                table, foreign_key.column
            );
            Err(ValidationError::NotAValidForeignKey {
                table: table.to_string(),
                column: foreign_key.column.clone(),
                referenced_table: foreign_key.referenced_table.clone(),
                alias: foreign_key.alias.clone(),
                value: natural_key,
            }
            .into())
        }
        1 => {
            let stored = matches
                .pop()
                .and_then(|mut referenced| referenced.remove(&foreign_key.referenced_column))
                .unwrap_or(Value::Null);
            row.insert(foreign_key.column.clone(), stored);
            Ok(())
        }
        _ => Err(StoreError::AmbiguousNaturalKey {
            table: foreign_key.referenced_table.clone(),
            column: foreign_key.referenced_natural_key.clone(),
        }),
    }
}

fn check_shape(entity_type: &EntityType, row: &Row) -> Result<(), ValidationError> {
    let table = entity_type.table();

    if let Some(unknown) = row.keys().find(|name| entity_type.column(name).is_none()) {
        return Err(ValidationError::UnknownColumn {
            table: table.to_string(),
            column: unknown.clone(),
        });
    }

    for column in entity_type.columns() {
        let value = row.get(&column.name);
        let required = column.not_null || (column.primary_key && !column.is_auto_assigned());
        if required && matches!(value, None | Some(Value::Null)) {
            return Err(ValidationError::MissingRequiredColumn {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }

        if let (
            ColumnType::Text {
                max_len: Some(max_len),
            },
            Some(Value::String(text)),
        ) = (column.kind, value)
        {
            if text.chars().count() > max_len as usize {
                return Err(ValidationError::ValueTooLong {
                    table: table.to_string(),
                    column: column.name.clone(),
                    max_len,
                });
            }
        }
    }

    Ok(())
}
