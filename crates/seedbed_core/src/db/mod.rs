//! SQLite storage plumbing: connections, pooling and scoped sessions.
//!
//! # Responsibility
//! - Parse connection strings into concrete storage targets.
//! - Open and configure SQLite connections and the `r2d2` pool over them.
//! - Provide commit-or-rollback session scopes over pooled connections.
//!
//! # Invariants
//! - Every connection handed out has `foreign_keys=ON`.
//! - SQL identifiers are validated before they are interpolated into SQL.
//! - Storage errors are reported as `DbError` and never as validation errors.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;
mod pool;
pub mod session;
pub mod value;

pub use session::{Session, SessionManager};

pub type DbResult<T> = Result<T, DbError>;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Connection string cannot be mapped to a SQLite target.
    InvalidUrl(String),
    /// Table/column name is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// Value shape has no SQL column representation.
    UnsupportedValue {
        column: String,
    },
    /// No pooled connection could be obtained.
    Pool(r2d2::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidUrl(url) => write!(f, "unsupported database url `{url}`"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::UnsupportedValue { column } => {
                write!(f, "value for column `{column}` has no sql representation")
            }
            Self::Pool(err) => write!(f, "connection pool: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::InvalidUrl(_) | Self::InvalidIdentifier(_) | Self::UnsupportedValue { .. } => {
                None
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

/// Concrete storage target resolved from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    File(PathBuf),
    /// Named `memdb` in-memory database, unique per session manager.
    Memory(String),
}

impl DbTarget {
    /// Parses a connection string.
    ///
    /// Accepted forms: `sqlite::memory:`, `:memory:`, `sqlite://<path>`,
    /// `sqlite:<path>` and bare filesystem paths.
    pub fn parse(url: &str) -> DbResult<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }
        if matches!(trimmed, ":memory:" | "sqlite::memory:" | "sqlite://:memory:") {
            return Ok(Self::Memory(format!("seedbed-{}", uuid::Uuid::new_v4())));
        }

        let path = if let Some(rest) = trimmed.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("sqlite:") {
            rest
        } else if trimmed.contains("://") {
            return Err(DbError::InvalidUrl(url.to_string()));
        } else {
            trimmed
        };

        if path.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }
        Ok(Self::File(PathBuf::from(path)))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory(_) => "memory",
        }
    }
}

/// Returns `true` for names safe to splice into SQL as identifiers.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validates and double-quotes one SQL identifier.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    if !is_valid_identifier(name) {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}
