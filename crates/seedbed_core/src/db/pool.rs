//! `r2d2` connection pool shared by all sessions of one manager.

use super::open::connection_manager;
use super::{DbResult, DbTarget};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

// r2d2 rejects a zero checkout timeout.
const MIN_CHECKOUT_TIMEOUT: Duration = Duration::from_millis(1);

pub(crate) type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Builds a pool of at most `max_connections` configured connections.
///
/// One connection is opened eagerly so an unreachable store fails here
/// rather than on the first session. A checkout beyond `max_connections`
/// waits up to `busy_timeout` for a connection to be returned.
pub(crate) fn create_pool(
    target: &DbTarget,
    busy_timeout: Duration,
    max_connections: u32,
) -> DbResult<DbPool> {
    let pool = r2d2::Pool::builder()
        .max_size(max_connections.max(1))
        .min_idle(Some(1))
        .connection_timeout(busy_timeout.max(MIN_CHECKOUT_TIMEOUT))
        .build(connection_manager(target, busy_timeout))?;
    Ok(pool)
}
