//! Startup bootstrap: schema materialization and seed-data insertion.
//!
//! # Responsibility
//! - Create every registered table in one schema scope.
//! - Insert each entity type's seed rows as one batch per type.
//!
//! # Invariants
//! - Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS`).
//! - Seed insertion is not: a rerun surfaces `ElementAlreadyExists` for
//!   colliding unique values, and the failing batch leaves no rows behind.
//! - Bootstrap stops at the first failing batch and returns its error.

use super::store::{error_code, Store};
use crate::error::{StoreError, StoreResult};
use crate::schema::create_table_sql;
use log::{error, info};
use std::time::Instant;

/// Outcome of a successful `init_db` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Tables ensured by the schema scope.
    pub tables: usize,
    /// Seed rows inserted, per table, in registration order.
    pub seeded: Vec<(String, usize)>,
}

impl BootstrapReport {
    pub fn seeded_rows(&self) -> usize {
        self.seeded.iter().map(|(_, rows)| rows).sum()
    }
}

impl Store {
    /// Ensures the schema exists, then inserts registered seed data.
    ///
    /// Call once at process startup, before any other operation.
    ///
    /// # Errors
    /// - `StoreError::Db` when schema creation fails.
    /// - The first failing seed batch's error (typically
    ///   `ValidationError::ElementAlreadyExists` on restart).
    pub fn init_db(&self) -> StoreResult<BootstrapReport> {
        let started_at = Instant::now();
        let mut report = BootstrapReport::default();
        info!(
            "event=init_db module=bootstrap status=start entity_types={}",
            self.registry().len()
        );

        let tables = self.sessions().with_session(|session| {
            let mut tables = 0;
            for entity_type in self.registry().entity_types() {
                session.execute_batch(&create_table_sql(entity_type)?)?;
                tables += 1;
            }
            Ok::<_, StoreError>(tables)
        });
        report.tables = match tables {
            Ok(tables) => tables,
            Err(err) => {
                error!(
                    "event=init_db module=bootstrap status=error stage=schema error_code={} duration_ms={}",
                    error_code(&err),
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };

        for (table, rows) in self.registry().seed_rows() {
            match self.insert_many(table, rows.iter().cloned()) {
                Ok(inserted) => report.seeded.push((table.to_string(), inserted)),
                Err(err) => {
                    error!(
                        "event=init_db module=bootstrap status=error stage=seed table={} error_code={} duration_ms={}",
                        table,
                        error_code(&err),
                        started_at.elapsed().as_millis()
                    );
                    return Err(err);
                }
            }
        }

        info!(
            "event=init_db module=bootstrap status=ok tables={} seeded_rows={} duration_ms={}",
            report.tables,
            report.seeded_rows(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
