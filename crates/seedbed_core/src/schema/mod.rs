//! Schema registry and DDL generation.
//!
//! # Responsibility
//! - Track registered entity types, their natural keys and seed rows.
//! - Cache per-entity foreign-key and unique-column introspection.
//! - Render idempotent `CREATE TABLE` statements.
//!
//! # Invariants
//! - Foreign-key targets are registered before their dependents.
//! - Introspection results are computed once, at registration.

pub mod ddl;
pub mod registry;

pub use ddl::create_table_sql;
pub use registry::{ForeignKeyRef, RegistryError, SchemaRegistry};
