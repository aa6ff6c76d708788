//! Scoped transactional sessions over pooled connections.
//!
//! # Responsibility
//! - Own the process-wide connection pool for one storage target.
//! - Run caller bodies inside one transaction with commit-or-rollback.
//! - Queue, flush and look up entity rows inside that transaction.
//!
//! # Invariants
//! - Exactly one commit or rollback happens per `with_session` call.
//! - A failing body's error is returned unchanged; rollback failures are
//!   logged and never replace it.
//! - Lookups flush pending entities first, so queued rows are visible to
//!   later lookups in the same scope.
//! - The pooled connection is returned on every exit path, panics included.

use super::open::open_connection;
use super::pool::{create_pool, DbPool};
use super::value::{read_row, to_sql_value};
use super::{quote_identifier, DbError, DbResult, DbTarget};
use crate::config::StoreConfig;
use crate::model::entity::{Entity, Row};
use log::{debug, error, info, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Instant;

/// Owner of the storage connection pool; constructed once and shared by reference.
pub struct SessionManager {
    pool: DbPool,
    target: DbTarget,
    echo_sql: bool,
    // Keeps a named in-memory database alive while pooled connections
    // come and go.
    _anchor: Option<Mutex<Connection>>,
}

impl SessionManager {
    /// Resolves the configured target and opens the first connection.
    ///
    /// # Errors
    /// - `DbError::InvalidUrl` for unsupported connection strings.
    /// - `DbError::Sqlite` when the in-memory anchor cannot be opened.
    /// - `DbError::Pool` when the pool cannot open its first connection.
    pub fn connect(config: &StoreConfig) -> DbResult<Self> {
        let started_at = Instant::now();
        let target = DbTarget::parse(&config.database_url)?;
        let mode = target.mode();
        info!("event=store_connect module=db status=start mode={mode}");

        let anchor = match &target {
            DbTarget::Memory(_) => Some(Mutex::new(open_connection(&target, config.busy_timeout)?)),
            DbTarget::File(_) => None,
        };
        let pool = create_pool(&target, config.busy_timeout, config.max_connections)?;

        info!(
            "event=store_connect module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            pool,
            target,
            echo_sql: config.echo_sql,
            _anchor: anchor,
        })
    }

    pub fn target(&self) -> &DbTarget {
        &self.target
    }

    pub fn idle_connections(&self) -> usize {
        self.pool.state().idle_connections as usize
    }

    /// Runs `body` inside one transactional scope.
    ///
    /// On `Ok` pending entities are flushed and the transaction commits.
    /// On `Err` the transaction rolls back and the body's error is returned
    /// as-is. Transactions begin `IMMEDIATE`, so concurrent writers are
    /// serialized by the store and wait up to the busy timeout.
    ///
    /// # Errors
    /// - The body's own error, unchanged.
    /// - `DbError` (converted into `E`) when checkout, begin, flush or commit fails.
    pub fn with_session<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let started_at = Instant::now();
        let mut conn = self.pool.get().map_err(DbError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let mut session = Session::new(tx, self.echo_sql);

        match body(&mut session) {
            Ok(value) => match session.commit() {
                Ok(written) => {
                    debug!(
                        "event=session_scope module=db status=committed rows_written={} duration_ms={}",
                        written,
                        started_at.elapsed().as_millis()
                    );
                    Ok(value)
                }
                Err(err) => {
                    error!(
                        "event=session_scope module=db status=error error_code=commit_failed duration_ms={} error={}",
                        started_at.elapsed().as_millis(),
                        err
                    );
                    Err(err.into())
                }
            },
            Err(err) => {
                match session.rollback() {
                    Ok(()) => warn!(
                        "event=session_scope module=db status=rolled_back duration_ms={}",
                        started_at.elapsed().as_millis()
                    ),
                    Err(rollback_err) => error!(
                        "event=session_scope module=db status=error error_code=rollback_failed duration_ms={} error={}",
                        started_at.elapsed().as_millis(),
                        rollback_err
                    ),
                }
                Err(err)
            }
        }
    }

    /// Explicit teardown; drops every pooled connection.
    pub fn close(self) {
        let state = self.pool.state();
        info!(
            "event=store_close module=db status=ok mode={} open_connections={}",
            self.target.mode(),
            state.connections
        );
    }
}

/// One transactional unit of work bound to a single connection.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    pending: Vec<Entity>,
    written: usize,
    echo_sql: bool,
}

impl<'conn> Session<'conn> {
    fn new(tx: Transaction<'conn>, echo_sql: bool) -> Self {
        Self {
            tx,
            pending: Vec::new(),
            written: 0,
            echo_sql,
        }
    }

    /// Queues one entity for insertion at the next flush.
    pub fn add(&mut self, entity: Entity) {
        self.pending.push(entity);
    }

    pub fn add_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.pending.extend(entities);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Writes every queued entity, in queue order, inside the transaction.
    ///
    /// Returns the number of rows written by this call.
    pub fn flush(&mut self) -> DbResult<usize> {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for entity in &pending {
            self.insert_entity(entity)?;
        }
        self.written += count;
        Ok(count)
    }

    /// Rows whose `column` equals `value`, at most `limit` of them when set.
    pub fn find_by(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> DbResult<Vec<Row>> {
        self.flush()?;
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql.push(';');
        self.echo(&sql);

        let bound = to_sql_value(column, value)?;
        let mut stmt = self.tx.prepare_cached(&sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query([bound])?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            found.push(read_row(row, &column_names)?);
        }
        Ok(found)
    }

    /// Whether any row has `column` equal to `value`.
    pub fn exists(&mut self, table: &str, column: &str, value: &Value) -> DbResult<bool> {
        self.flush()?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        self.echo(&sql);

        let bound = to_sql_value(column, value)?;
        let found: i64 = self.tx.query_row(&sql, [bound], |row| row.get(0))?;
        Ok(found == 1)
    }

    pub fn count_rows(&mut self, table: &str) -> DbResult<u64> {
        self.flush()?;
        let sql = format!("SELECT COUNT(*) FROM {};", quote_identifier(table)?);
        self.echo(&sql);
        let count: i64 = self.tx.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Runs raw DDL/maintenance SQL inside the transaction.
    pub fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.echo(sql);
        self.tx.execute_batch(sql)?;
        Ok(())
    }

    fn insert_entity(&self, entity: &Entity) -> DbResult<()> {
        let table = quote_identifier(&entity.table)?;
        let sql = if entity.values.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES;")
        } else {
            let mut columns = Vec::with_capacity(entity.values.len());
            let mut placeholders = Vec::with_capacity(entity.values.len());
            for (index, name) in entity.values.keys().enumerate() {
                columns.push(quote_identifier(name)?);
                placeholders.push(format!("?{}", index + 1));
            }
            format!(
                "INSERT INTO {table} ({}) VALUES ({});",
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        self.echo(&sql);

        let bound = entity
            .values
            .iter()
            .map(|(name, value)| to_sql_value(name, value))
            .collect::<DbResult<Vec<SqlValue>>>()?;
        self.tx.execute(&sql, params_from_iter(bound))?;
        Ok(())
    }

    fn commit(mut self) -> DbResult<usize> {
        self.flush()?;
        let written = self.written;
        self.tx.commit()?;
        Ok(written)
    }

    fn rollback(self) -> DbResult<()> {
        self.tx.rollback()?;
        Ok(())
    }

    fn echo(&self, sql: &str) {
        if self.echo_sql {
            debug!("event=sql_echo module=db sql={}", sql.replace('\n', " "));
        }
    }
}
