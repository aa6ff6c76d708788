//! In-process entity-type registry.

use crate::model::entity::{EntityType, Row};
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Registration and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Table is not registered.
    UnknownEntityType(String),
    /// Same table name registered with a different shape.
    Conflict(String),
    /// Foreign key targets a table that is not registered yet.
    UnknownReference {
        table: String,
        column: String,
        referenced_table: String,
    },
    /// Foreign key targets a column the referenced table does not have.
    UnknownReferencedColumn {
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    /// Foreign key targets a column that is neither primary key nor unique.
    ReferencedColumnNotUnique {
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    /// Natural-key alias clashes with a real column or another foreign key.
    AliasCollision {
        table: String,
        column: String,
        alias: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntityType(table) => write!(f, "entity type not registered: {table}"),
            Self::Conflict(table) => {
                write!(f, "entity type `{table}` already registered with a different shape")
            }
            Self::UnknownReference {
                table,
                column,
                referenced_table,
            } => write!(
                f,
                "`{table}.{column}` references unregistered entity type `{referenced_table}`"
            ),
            Self::UnknownReferencedColumn {
                table,
                column,
                referenced_table,
                referenced_column,
            } => write!(
                f,
                "`{table}.{column}` references missing column `{referenced_table}.{referenced_column}`"
            ),
            Self::ReferencedColumnNotUnique {
                table,
                column,
                referenced_table,
                referenced_column,
            } => write!(
                f,
                "`{table}.{column}` references `{referenced_table}.{referenced_column}`, which is neither primary key nor unique"
            ),
            Self::AliasCollision {
                table,
                column,
                alias,
            } => write!(
                f,
                "natural-key alias `{alias}` for `{table}.{column}` collides with another field; declare an explicit alias"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Cached foreign-key introspection for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    /// Foreign-key column on the declaring entity.
    pub column: String,
    pub referenced_table: String,
    /// Column of the referenced row stored into `column`.
    pub referenced_column: String,
    /// Natural-key column of the referenced table used for the lookup.
    pub referenced_natural_key: String,
    /// Candidate-row field carrying the natural-key value.
    pub alias: String,
}

#[derive(Debug, Clone)]
struct Registered {
    entity: EntityType,
    foreign_keys: Vec<ForeignKeyRef>,
    unique_columns: Vec<String>,
}

/// Registry of entity types, natural keys and seed rows.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    order: Vec<String>,
    entries: BTreeMap<String, Registered>,
    seed_rows: BTreeMap<String, Vec<Row>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from entity types listed in dependency order.
    pub fn with_entity_types(
        entity_types: impl IntoIterator<Item = EntityType>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entity_type in entity_types {
            registry.register(entity_type)?;
        }
        Ok(registry)
    }

    /// Registers one entity type.
    ///
    /// Registering an identical shape again is a no-op (its seed rows are
    /// not added twice).
    ///
    /// # Errors
    /// - `Conflict` when the table is already registered with another shape.
    /// - `UnknownReference` / `UnknownReferencedColumn` for dangling foreign keys.
    /// - `AliasCollision` when a natural-key alias shadows another field.
    pub fn register(&mut self, entity_type: EntityType) -> Result<(), RegistryError> {
        let table = entity_type.table().to_string();
        if let Some(existing) = self.entries.get(&table) {
            if existing.entity.same_shape(&entity_type) {
                return Ok(());
            }
            return Err(RegistryError::Conflict(table));
        }

        let foreign_keys = self.introspect_foreign_keys(&entity_type)?;
        let unique_columns = entity_type
            .columns()
            .iter()
            .filter(|column| column.unique)
            .map(|column| column.name.clone())
            .collect::<Vec<_>>();

        debug!(
            "event=entity_register module=schema status=ok table={} natural_key={} foreign_keys={} unique_columns={} seed_rows={}",
            table,
            entity_type.natural_key(),
            foreign_keys.len(),
            unique_columns.len(),
            entity_type.seed_rows().len()
        );

        if !entity_type.seed_rows().is_empty() {
            self.seed_rows
                .entry(table.clone())
                .or_default()
                .extend(entity_type.seed_rows().iter().cloned());
        }
        self.order.push(table.clone());
        self.entries.insert(
            table,
            Registered {
                entity: entity_type,
                foreign_keys,
                unique_columns,
            },
        );
        Ok(())
    }

    /// Appends seed rows for an already registered table.
    pub fn register_seed_rows(
        &mut self,
        table: &str,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<(), RegistryError> {
        self.entry(table)?;
        self.seed_rows
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        Ok(())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entries.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entity_type(&self, table: &str) -> Result<&EntityType, RegistryError> {
        Ok(&self.entry(table)?.entity)
    }

    /// Natural-key column name for a registered table.
    pub fn natural_key(&self, table: &str) -> Result<&str, RegistryError> {
        Ok(self.entry(table)?.entity.natural_key())
    }

    /// Cached foreign keys of `table`, in column order.
    pub fn resolve_foreign_keys(&self, table: &str) -> Result<&[ForeignKeyRef], RegistryError> {
        Ok(&self.entry(table)?.foreign_keys)
    }

    /// Cached columns of `table` declared `UNIQUE` (primary key not included).
    pub fn unique_columns(&self, table: &str) -> Result<&[String], RegistryError> {
        Ok(&self.entry(table)?.unique_columns)
    }

    /// Registered entity types in registration order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> + '_ {
        self.order
            .iter()
            .filter_map(|table| self.entries.get(table).map(|entry| &entry.entity))
    }

    /// Seed rows per table, in registration order; tables without seeds are skipped.
    pub fn seed_rows(&self) -> impl Iterator<Item = (&str, &[Row])> + '_ {
        self.order.iter().filter_map(|table| {
            self.seed_rows
                .get(table)
                .filter(|rows| !rows.is_empty())
                .map(|rows| (table.as_str(), rows.as_slice()))
        })
    }

    fn entry(&self, table: &str) -> Result<&Registered, RegistryError> {
        self.entries
            .get(table)
            .ok_or_else(|| RegistryError::UnknownEntityType(table.to_string()))
    }

    fn introspect_foreign_keys(
        &self,
        entity_type: &EntityType,
    ) -> Result<Vec<ForeignKeyRef>, RegistryError> {
        let table = entity_type.table();
        let mut resolved: Vec<ForeignKeyRef> = Vec::new();

        for column in entity_type.columns() {
            let Some(foreign_key) = &column.foreign_key else {
                continue;
            };

            let referenced = if foreign_key.table == table {
                entity_type
            } else {
                self.entries
                    .get(&foreign_key.table)
                    .map(|entry| &entry.entity)
                    .ok_or_else(|| RegistryError::UnknownReference {
                        table: table.to_string(),
                        column: column.name.clone(),
                        referenced_table: foreign_key.table.clone(),
                    })?
            };

            let Some(target) = referenced.column(&foreign_key.column) else {
                return Err(RegistryError::UnknownReferencedColumn {
                    table: table.to_string(),
                    column: column.name.clone(),
                    referenced_table: foreign_key.table.clone(),
                    referenced_column: foreign_key.column.clone(),
                });
            };
            if !target.primary_key && !target.unique {
                return Err(RegistryError::ReferencedColumnNotUnique {
                    table: table.to_string(),
                    column: column.name.clone(),
                    referenced_table: foreign_key.table.clone(),
                    referenced_column: foreign_key.column.clone(),
                });
            }

            let alias = foreign_key
                .alias
                .clone()
                .unwrap_or_else(|| referenced.natural_key().to_string());
            let shadows_column = entity_type.column(&alias).is_some();
            let shadows_alias = resolved.iter().any(|earlier| earlier.alias == alias);
            if shadows_column || shadows_alias {
                return Err(RegistryError::AliasCollision {
                    table: table.to_string(),
                    column: column.name.clone(),
                    alias,
                });
            }

            resolved.push(ForeignKeyRef {
                column: column.name.clone(),
                referenced_table: referenced.table().to_string(),
                referenced_column: foreign_key.column.clone(),
                referenced_natural_key: referenced.natural_key().to_string(),
                alias,
            });
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::{ForeignKeyRef, RegistryError, SchemaRegistry};
    use crate::model::entity::{Column, EntityType, Row};
    use serde_json::json;

    fn roles() -> EntityType {
        EntityType::builder("roles")
            .natural_key("name")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name", 30).unique().not_null())
            .build()
            .unwrap()
    }

    fn users() -> EntityType {
        EntityType::builder("users")
            .natural_key("username")
            .column(Column::integer("id").primary_key())
            .column(Column::text("username", 30).unique().not_null())
            .column(Column::integer("role_id").references("roles", "id"))
            .build()
            .unwrap()
    }

    fn seed(name: &str) -> Row {
        json!({ "name": name }).as_object().cloned().unwrap()
    }

    #[test]
    fn register_caches_foreign_keys_and_unique_columns() {
        let registry = SchemaRegistry::with_entity_types([roles(), users()]).unwrap();

        assert_eq!(registry.natural_key("users").unwrap(), "username");
        assert_eq!(
            registry.resolve_foreign_keys("users").unwrap(),
            &[ForeignKeyRef {
                column: "role_id".to_string(),
                referenced_table: "roles".to_string(),
                referenced_column: "id".to_string(),
                referenced_natural_key: "name".to_string(),
                alias: "name".to_string(),
            }]
        );
        assert_eq!(registry.unique_columns("users").unwrap(), &["username".to_string()]);
        assert!(registry.resolve_foreign_keys("roles").unwrap().is_empty());
    }

    #[test]
    fn register_is_idempotent_for_identical_shape() {
        let mut registry = SchemaRegistry::new();
        registry.register(roles()).unwrap();
        registry.register(roles()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_conflicting_shape() {
        let mut registry = SchemaRegistry::new();
        registry.register(roles()).unwrap();
        let other = EntityType::builder("roles")
            .column(Column::text("code", 5).primary_key())
            .build()
            .unwrap();
        assert_eq!(
            registry.register(other),
            Err(RegistryError::Conflict("roles".to_string()))
        );
    }

    #[test]
    fn dependents_require_registered_targets() {
        let mut registry = SchemaRegistry::new();
        let err = registry.register(users()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownReference { ref referenced_table, .. } if referenced_table == "roles"
        ));
    }

    #[test]
    fn referenced_column_must_exist() {
        let mut registry = SchemaRegistry::new();
        registry.register(roles()).unwrap();
        let broken = EntityType::builder("users")
            .column(Column::integer("id").primary_key())
            .column(Column::integer("role_id").references("roles", "uuid"))
            .build()
            .unwrap();
        assert!(matches!(
            registry.register(broken),
            Err(RegistryError::UnknownReferencedColumn { .. })
        ));
    }

    #[test]
    fn referenced_column_must_be_primary_key_or_unique() {
        let groups = EntityType::builder("groups")
            .natural_key("name")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name", 30).unique().not_null())
            .column(Column::text("grp", 30))
            .build()
            .unwrap();
        let mut registry = SchemaRegistry::with_entity_types([groups]).unwrap();

        let by_plain_column = EntityType::builder("members")
            .column(Column::integer("id").primary_key())
            .column(Column::text("grp", 30).references("groups", "grp"))
            .build()
            .unwrap();
        assert_eq!(
            registry.register(by_plain_column),
            Err(RegistryError::ReferencedColumnNotUnique {
                table: "members".to_string(),
                column: "grp".to_string(),
                referenced_table: "groups".to_string(),
                referenced_column: "grp".to_string(),
            })
        );
        assert!(!registry.contains("members"));

        let by_unique_column = EntityType::builder("members")
            .column(Column::integer("id").primary_key())
            .column(Column::text("group_name", 30).references("groups", "name").alias("group"))
            .build()
            .unwrap();
        registry.register(by_unique_column).unwrap();
        assert_eq!(
            registry.resolve_foreign_keys("members").unwrap()[0].referenced_column,
            "name"
        );
    }

    #[test]
    fn self_reference_needs_explicit_alias() {
        let without_alias = EntityType::builder("nodes")
            .column(Column::text("key", 10).primary_key())
            .column(Column::text("parent", 10).references("nodes", "key"))
            .build()
            .unwrap();
        assert!(matches!(
            SchemaRegistry::new().register(without_alias),
            Err(RegistryError::AliasCollision { .. })
        ));

        let with_alias = EntityType::builder("nodes")
            .column(Column::text("key", 10).primary_key())
            .column(Column::text("parent", 10).references("nodes", "key").alias("ref"))
            .build()
            .unwrap();
        let mut registry = SchemaRegistry::new();
        registry.register(with_alias).unwrap();
        let foreign_keys = registry.resolve_foreign_keys("nodes").unwrap();
        assert_eq!(foreign_keys[0].alias, "ref");
        assert_eq!(foreign_keys[0].referenced_natural_key, "key");
    }

    #[test]
    fn seed_rows_follow_registration_order() {
        let mut registry = SchemaRegistry::with_entity_types([roles(), users()]).unwrap();
        registry
            .register_seed_rows("roles", [seed("admin"), seed("player")])
            .unwrap();

        let seeds: Vec<(&str, usize)> = registry
            .seed_rows()
            .map(|(table, rows)| (table, rows.len()))
            .collect();
        assert_eq!(seeds, vec![("roles", 2)]);

        assert_eq!(
            registry.register_seed_rows("missing", [seed("x")]),
            Err(RegistryError::UnknownEntityType("missing".to_string()))
        );
    }

    #[test]
    fn entity_types_iterate_in_registration_order() {
        let registry = SchemaRegistry::with_entity_types([roles(), users()]).unwrap();
        let tables: Vec<&str> = registry.entity_types().map(|entity| entity.table()).collect();
        assert_eq!(tables, vec!["roles", "users"]);
    }
}
