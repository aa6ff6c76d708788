//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or named in-memory (`memdb` VFS) SQLite connections.
//! - Configure connection pragmas required by core behavior.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections carry the configured busy timeout.
//! - In-memory targets use normal file locking, so contended writers wait
//!   on the busy timeout instead of failing with `SQLITE_LOCKED`.

use super::{DbResult, DbTarget};
use log::{debug, error};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::{Duration, Instant};

/// Opens one configured connection to `target`, outside any pool.
///
/// # Side effects
/// - Emits `db_connect` logging events with duration and status.
pub(crate) fn open_connection(target: &DbTarget, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();

    let opened = match target {
        DbTarget::File(path) => Connection::open(path),
        DbTarget::Memory(name) => Connection::open_with_flags(memory_uri(name), memory_flags()),
    };

    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_connect module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = configure_connection(&conn, busy_timeout) {
        error!(
            "event=db_connect module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }

    debug!(
        "event=db_connect module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// Connection manager for the `r2d2` pool; every pooled connection runs the
/// same pragma bootstrap as `open_connection`.
pub(crate) fn connection_manager(
    target: &DbTarget,
    busy_timeout: Duration,
) -> SqliteConnectionManager {
    let mode = target.mode();
    let manager = match target {
        DbTarget::File(path) => SqliteConnectionManager::file(path),
        DbTarget::Memory(name) => {
            SqliteConnectionManager::file(memory_uri(name)).with_flags(memory_flags())
        }
    };

    manager.with_init(move |conn| {
        configure_connection(conn, busy_timeout)?;
        debug!("event=db_connect module=db status=ok mode={mode} pooled=true");
        Ok(())
    })
}

fn memory_uri(name: &str) -> String {
    format!("file:/{name}?vfs=memdb")
}

fn memory_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
