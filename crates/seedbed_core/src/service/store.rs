//! Caller-facing store: validated single and batch insertion.
//!
//! # Responsibility
//! - Own the shared session manager and the schema registry.
//! - Run every insert inside its own managed session scope.
//!
//! # Invariants
//! - Rows never reach storage without passing `validate_and_build`.
//! - A batch is all-or-nothing: any failing row rolls back the whole scope.
//! - Within a batch, row N+1 sees rows 1..N (each is flushed after validation).

use crate::config::StoreConfig;
use crate::db::SessionManager;
use crate::error::{StoreError, StoreResult};
use crate::model::default_models;
use crate::model::entity::{EntityType, Row};
use crate::schema::SchemaRegistry;
use crate::validation::validate_and_build;
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Validated data-access entry point shared by callers.
pub struct Store {
    sessions: Arc<SessionManager>,
    registry: SchemaRegistry,
}

impl Store {
    /// Wraps an already connected session manager and a populated registry.
    pub fn new(sessions: Arc<SessionManager>, registry: SchemaRegistry) -> Self {
        Self { sessions, registry }
    }

    /// Connects to the configured store and registers `entity_types` in the
    /// given order.
    pub fn connect(
        config: &StoreConfig,
        entity_types: impl IntoIterator<Item = EntityType>,
    ) -> StoreResult<Self> {
        let registry = SchemaRegistry::with_entity_types(entity_types)?;
        let sessions = SessionManager::connect(config)?;
        Ok(Self::new(Arc::new(sessions), registry))
    }

    /// Connects using `SEEDBED_*` environment configuration and the bundled models.
    ///
    /// # Errors
    /// - `StoreError::Config` when `SEEDBED_DATABASE_URL` is missing.
    pub fn from_env() -> StoreResult<Self> {
        let config = StoreConfig::from_env()?;
        Self::connect(&config, default_models()?)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Validates and inserts one row in its own scope.
    ///
    /// # Errors
    /// - `StoreError::Validation` for rejected rows; nothing is persisted.
    /// - `StoreError::Db` when storage fails, after rollback.
    pub fn insert(&self, table: &str, row: Row) -> StoreResult<()> {
        self.insert_many(table, [row]).map(|_| ())
    }

    /// Validates and inserts `rows` in order inside one scope.
    ///
    /// Returns the number of inserted rows.
    ///
    /// # Errors
    /// - The first failing row's error; the whole batch is rolled back.
    pub fn insert_many(
        &self,
        table: &str,
        rows: impl IntoIterator<Item = Row>,
    ) -> StoreResult<usize> {
        let started_at = Instant::now();
        let result = self.sessions.with_session(|session| {
            let mut inserted = 0;
            for row in rows {
                let entity = validate_and_build(&self.registry, table, row, session)?;
                session.add(entity);
                session.flush()?;
                inserted += 1;
            }
            Ok::<_, StoreError>(inserted)
        });

        match &result {
            Ok(inserted) => info!(
                "event=insert_rows module=store status=ok table={} rows={} duration_ms={}",
                table,
                inserted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=insert_rows module=store status=error table={} error_code={} duration_ms={}",
                table,
                error_code(err),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Rows of `table` whose `column` equals `value`.
    pub fn find_by(&self, table: &str, column: &str, value: &Value) -> StoreResult<Vec<Row>> {
        self.registry.entity_type(table)?;
        self.sessions
            .with_session(|session| session.find_by(table, column, value, None))
            .map_err(StoreError::from)
    }

    pub fn count_rows(&self, table: &str) -> StoreResult<u64> {
        self.registry.entity_type(table)?;
        self.sessions
            .with_session(|session| session.count_rows(table))
            .map_err(StoreError::from)
    }
}

pub(crate) fn error_code(err: &StoreError) -> &'static str {
    match err {
        StoreError::Validation(validation) => validation.code(),
        StoreError::Registry(_) => "registry",
        StoreError::Definition(_) => "definition",
        StoreError::Db(_) => "storage",
        StoreError::Config(_) => "config",
        StoreError::AmbiguousNaturalKey { .. } => "ambiguous_natural_key",
    }
}
