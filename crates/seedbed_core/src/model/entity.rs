//! Statically declared entity-type descriptors.
//!
//! # Responsibility
//! - Describe a table: ordered columns with primary-key, unique,
//!   not-null and foreign-key roles.
//! - Carry the natural key used to reference rows across the public API.
//! - Hold the validated `Entity` instance produced from a candidate row.
//!
//! # Invariants
//! - A built `EntityType` has exactly one primary key and unique column names.
//! - The natural key names one of the entity's own columns.
//! - Descriptors are immutable once built.

use crate::db::is_valid_identifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Candidate or stored row: column/field name → value.
pub type Row = Map<String, Value>;

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text { max_len: Option<u32> },
    Integer,
    Real,
    Boolean,
}

impl ColumnType {
    /// SQL type name used in generated DDL.
    pub fn sql_name(&self) -> String {
        match self {
            Self::Text { max_len: Some(len) } => format!("VARCHAR({len})"),
            Self::Text { max_len: None } => "TEXT".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::Real => "REAL".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
        }
    }
}

/// Foreign-key declaration on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column whose value the foreign-key column stores.
    pub column: String,
    /// Field carrying the referenced row's natural key in candidate rows.
    ///
    /// `None` means "the referenced table's natural-key name".
    pub alias: Option<String>,
}

/// One column of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            not_null: false,
            unique: false,
            foreign_key: None,
        }
    }

    /// `VARCHAR(max_len)` column.
    pub fn text(name: impl Into<String>, max_len: u32) -> Self {
        Self::new(
            name,
            ColumnType::Text {
                max_len: Some(max_len),
            },
        )
    }

    /// Unbounded `TEXT` column.
    pub fn long_text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text { max_len: None })
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Declares a foreign key storing `column` of `table`.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            alias: None,
        });
        self
    }

    /// Overrides the candidate-row field carrying the referenced natural key.
    ///
    /// Has no effect unless `references` was called first.
    pub fn alias(mut self, field: impl Into<String>) -> Self {
        if let Some(foreign_key) = self.foreign_key.as_mut() {
            foreign_key.alias = Some(field.into());
        }
        self
    }

    /// Integer primary keys alias the SQLite rowid and may be omitted on insert.
    pub fn is_auto_assigned(&self) -> bool {
        self.primary_key && self.kind == ColumnType::Integer
    }
}

/// Descriptor validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDefinitionError {
    InvalidIdentifier(String),
    NoColumns(String),
    DuplicateColumn { table: String, column: String },
    PrimaryKeyCount { table: String, found: usize },
    UnknownNaturalKey { table: String, column: String },
}

impl Display for EntityDefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::NoColumns(table) => write!(f, "entity `{table}` declares no columns"),
            Self::DuplicateColumn { table, column } => {
                write!(f, "entity `{table}` declares column `{column}` twice")
            }
            Self::PrimaryKeyCount { table, found } => write!(
                f,
                "entity `{table}` must declare exactly one primary key, found {found}"
            ),
            Self::UnknownNaturalKey { table, column } => {
                write!(f, "natural key `{column}` is not a column of `{table}`")
            }
        }
    }
}

impl Error for EntityDefinitionError {}

/// Logical table definition.
///
/// Only constructed through `EntityTypeBuilder::build`, so every instance
/// satisfies the module invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityType {
    table: String,
    natural_key: String,
    columns: Vec<Column>,
    seed_rows: Vec<Row>,
}

impl EntityType {
    pub fn builder(table: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            table: table.into(),
            natural_key: None,
            columns: Vec::new(),
            seed_rows: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Rows inserted once at bootstrap, in declaration order.
    pub fn seed_rows(&self) -> &[Row] {
        &self.seed_rows
    }

    /// Same shape, ignoring seed rows.
    pub fn same_shape(&self, other: &EntityType) -> bool {
        self.table == other.table
            && self.natural_key == other.natural_key
            && self.columns == other.columns
    }
}

/// Builder for `EntityType`; validation runs in `build`.
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    table: String,
    natural_key: Option<String>,
    columns: Vec<Column>,
    seed_rows: Vec<Row>,
}

impl EntityTypeBuilder {
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Natural key column; defaults to the primary key.
    pub fn natural_key(mut self, column: impl Into<String>) -> Self {
        self.natural_key = Some(column.into());
        self
    }

    pub fn seed_rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.seed_rows.extend(rows);
        self
    }

    pub fn build(self) -> Result<EntityType, EntityDefinitionError> {
        let table = self.table;
        if !is_valid_identifier(&table) {
            return Err(EntityDefinitionError::InvalidIdentifier(table));
        }
        if self.columns.is_empty() {
            return Err(EntityDefinitionError::NoColumns(table));
        }

        for (index, column) in self.columns.iter().enumerate() {
            if !is_valid_identifier(&column.name) {
                return Err(EntityDefinitionError::InvalidIdentifier(column.name.clone()));
            }
            if let Some(foreign_key) = &column.foreign_key {
                for name in [Some(&foreign_key.table), Some(&foreign_key.column), foreign_key.alias.as_ref()]
                    .into_iter()
                    .flatten()
                {
                    if !is_valid_identifier(name) {
                        return Err(EntityDefinitionError::InvalidIdentifier(name.clone()));
                    }
                }
            }
            if self.columns[..index]
                .iter()
                .any(|earlier| earlier.name == column.name)
            {
                return Err(EntityDefinitionError::DuplicateColumn {
                    table,
                    column: column.name.clone(),
                });
            }
        }

        let primary_keys: Vec<&Column> = self
            .columns
            .iter()
            .filter(|column| column.primary_key)
            .collect();
        if primary_keys.len() != 1 {
            return Err(EntityDefinitionError::PrimaryKeyCount {
                table,
                found: primary_keys.len(),
            });
        }

        let natural_key = self
            .natural_key
            .unwrap_or_else(|| primary_keys[0].name.clone());
        if !self.columns.iter().any(|column| column.name == natural_key) {
            return Err(EntityDefinitionError::UnknownNaturalKey {
                table,
                column: natural_key,
            });
        }

        Ok(EntityType {
            table,
            natural_key,
            columns: self.columns,
            seed_rows: self.seed_rows,
        })
    }
}

/// Validated instance ready to be added to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub table: String,
    pub values: Row,
}

impl Entity {
    pub fn new(table: impl Into<String>, values: Row) -> Self {
        Self {
            table: table.into(),
            values,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, ColumnType, EntityDefinitionError, EntityType};

    #[test]
    fn natural_key_defaults_to_primary_key() {
        let roles = EntityType::builder("roles")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name", 30).unique())
            .build()
            .unwrap();
        assert_eq!(roles.natural_key(), "id");
        assert!(roles.column("id").unwrap().primary_key);
    }

    #[test]
    fn build_rejects_missing_or_duplicate_primary_keys() {
        let none = EntityType::builder("t")
            .column(Column::text("a", 10))
            .build()
            .unwrap_err();
        assert_eq!(
            none,
            EntityDefinitionError::PrimaryKeyCount {
                table: "t".to_string(),
                found: 0
            }
        );

        let two = EntityType::builder("t")
            .column(Column::text("a", 10).primary_key())
            .column(Column::text("b", 10).primary_key())
            .build()
            .unwrap_err();
        assert!(matches!(two, EntityDefinitionError::PrimaryKeyCount { found: 2, .. }));
    }

    #[test]
    fn build_rejects_bad_shapes() {
        assert!(matches!(
            EntityType::builder("t").build(),
            Err(EntityDefinitionError::NoColumns(_))
        ));
        assert!(matches!(
            EntityType::builder("t")
                .column(Column::text("a", 10).primary_key())
                .column(Column::text("a", 10))
                .build(),
            Err(EntityDefinitionError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            EntityType::builder("t")
                .natural_key("missing")
                .column(Column::text("a", 10).primary_key())
                .build(),
            Err(EntityDefinitionError::UnknownNaturalKey { .. })
        ));
        assert!(matches!(
            EntityType::builder("bad table")
                .column(Column::text("a", 10).primary_key())
                .build(),
            Err(EntityDefinitionError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn alias_only_applies_to_foreign_keys() {
        let plain = Column::text("a", 10).alias("ignored");
        assert!(plain.foreign_key.is_none());

        let linked = Column::integer("parent_id")
            .references("roles", "id")
            .alias("parent");
        assert_eq!(
            linked.foreign_key.unwrap().alias.as_deref(),
            Some("parent")
        );
    }

    #[test]
    fn column_types_render_sql_names() {
        assert_eq!(ColumnType::Text { max_len: Some(30) }.sql_name(), "VARCHAR(30)");
        assert_eq!(ColumnType::Text { max_len: None }.sql_name(), "TEXT");
        assert_eq!(ColumnType::Integer.sql_name(), "INTEGER");
    }
}
