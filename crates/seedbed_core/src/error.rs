//! Top-level error for store operations.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::entity::EntityDefinitionError;
use crate::schema::RegistryError;
use crate::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error surfaced by `Store` operations.
///
/// Validation failures and storage failures stay in separate variants so
/// callers can tell a rejected row from a broken store.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    Registry(RegistryError),
    Definition(EntityDefinitionError),
    Db(DbError),
    Config(ConfigError),
    /// More than one row shares a natural key. Indicates a schema fault:
    /// natural keys are expected to be unique.
    AmbiguousNaturalKey {
        table: String,
        column: String,
    },
}

impl StoreError {
    /// `true` for rejected candidate rows (foreign key, uniqueness, shape).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Definition(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::AmbiguousNaturalKey { table, column } => write!(
                f,
                "natural key `{table}.{column}` matched more than one row"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Definition(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::AmbiguousNaturalKey { .. } => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RegistryError> for StoreError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<EntityDefinitionError> for StoreError {
    fn from(value: EntityDefinitionError) -> Self {
        Self::Definition(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
