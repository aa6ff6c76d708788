//! Validated data access over SQLite.
//!
//! Declarative entity registration, schema bootstrap, scoped transactional
//! sessions and validated row insertion with natural-key foreign-key
//! resolution and uniqueness enforcement.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod schema;
pub mod service;
pub mod validation;

pub use config::{required_env, ConfigError, StoreConfig};
pub use db::{DbError, DbResult, DbTarget, Session, SessionManager};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::default_models;
pub use model::entity::{Column, ColumnType, Entity, EntityDefinitionError, EntityType, Row};
pub use schema::{ForeignKeyRef, RegistryError, SchemaRegistry};
pub use service::bootstrap::BootstrapReport;
pub use service::store::Store;
pub use validation::{validate_and_build, ValidationError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
