//! Candidate-row validation and foreign-key resolution.
//!
//! # Responsibility
//! - Turn a caller-supplied row into a persistable `Entity`.
//! - Resolve natural-key references into stored foreign-key values.
//! - Reject rows that would duplicate a unique value.
//!
//! # Invariants
//! - Foreign keys are resolved strictly before uniqueness checks.
//! - All lookups run inside the caller's session, so rows queued or flushed
//!   earlier in the same scope are visible.

mod engine;

pub use engine::validate_and_build;

use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Candidate-row rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Supplied natural key matches no row of the referenced table.
    NotAValidForeignKey {
        table: String,
        column: String,
        referenced_table: String,
        alias: String,
        value: Value,
    },
    /// A non-empty unique value is already stored.
    ElementAlreadyExists {
        table: String,
        column: String,
        value: Value,
    },
    /// Row carries a field that is neither a column nor a foreign-key alias.
    UnknownColumn { table: String, column: String },
    /// Row leaves a `NOT NULL` column without a value.
    MissingRequiredColumn { table: String, column: String },
    /// Text value exceeds the declared `VARCHAR(n)` length.
    ValueTooLong {
        table: String,
        column: String,
        max_len: u32,
    },
}

impl ValidationError {
    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAValidForeignKey { .. } => "not_a_valid_foreign_key",
            Self::ElementAlreadyExists { .. } => "element_already_exists",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::MissingRequiredColumn { .. } => "missing_required_column",
            Self::ValueTooLong { .. } => "value_too_long",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAValidForeignKey {
                table,
                column,
                referenced_table,
                alias,
                value,
            } => write!(
                f,
                "not a valid foreign key: `{alias}` = {value} matches no `{referenced_table}` row (for `{table}.{column}`)"
            ),
            Self::ElementAlreadyExists {
                table,
                column,
                value,
            } => write!(
                f,
                "element already exists: `{table}.{column}` = {value}"
            ),
            Self::UnknownColumn { table, column } => {
                write!(f, "`{column}` is not a column of `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "`{table}.{column}` requires a value")
            }
            Self::ValueTooLong {
                table,
                column,
                max_len,
            } => write!(f, "`{table}.{column}` exceeds {max_len} characters"),
        }
    }
}

impl Error for ValidationError {}
