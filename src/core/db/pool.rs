/// Pool Module
///
/// Builds the r2d2 pools that back both halves of a connection pair and
/// validates them with a liveness probe before they are handed out.

use crate::core::{Result, SqlError};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
use tracing::{debug, warn};

/// A pool of SQLite connections
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// A connection checked out of a [`SqlitePool`]
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// How long a checkout waits before giving up, unless configured otherwise
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size used when `max_open` is 0.
///
/// r2d2 cannot express an unbounded pool and reserves storage for
/// `max_size` slots, so "unlimited" is capped here.
pub const UNLIMITED_MAX_OPEN: u32 = 1024;

/// Pragmas applied to every new pooled connection
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Pool sizing and timing accepted at construction.
///
/// `max_open == 0` means no practical limit ([`UNLIMITED_MAX_OPEN`]); a zero
/// `max_idle` keeps the r2d2 default idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of open connections (0 = [`UNLIMITED_MAX_OPEN`])
    pub max_open: u32,
    /// How long an idle connection may linger before being closed (0 = pool default)
    pub max_idle: Duration,
    /// How long a checkout, including the liveness probe, may wait
    pub connect_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            max_open: 0,
            max_idle: Duration::ZERO,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl PoolOptions {
    /// Creates options with the given pool size and idle time
    pub fn new(max_open: u32, max_idle: Duration) -> Self {
        PoolOptions {
            max_open,
            max_idle,
            ..PoolOptions::default()
        }
    }

    /// Overrides the maximum number of open connections
    pub fn with_max_open(mut self, max_open: u32) -> Self {
        self.max_open = max_open;
        self
    }

    /// Overrides the checkout timeout
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Creates a connection manager for a file source.
///
/// Every pooled connection opens the source separately, so `":memory:"`
/// gives each connection its own empty database.
pub fn source_manager(source: &str) -> SqliteConnectionManager {
    with_pragmas(SqliteConnectionManager::file(source))
}

/// Adds the per-connection pragmas to a manager
pub fn with_pragmas(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS))
}

/// Builds a pool around `manager` and probes it.
///
/// # Errors
///
/// Returns `SqlError::Connectivity` if no connection can be established or
/// the probe query fails. The pool is closed before the error is returned.
pub fn open_pool(manager: SqliteConnectionManager, options: PoolOptions) -> Result<SqlitePool> {
    let max_open = match options.max_open {
        0 => UNLIMITED_MAX_OPEN,
        n => n,
    };
    let mut builder = r2d2::Pool::builder()
        .max_size(max_open)
        .min_idle(Some(0))
        .connection_timeout(options.connect_timeout);
    if !options.max_idle.is_zero() {
        builder = builder.idle_timeout(Some(options.max_idle));
    }

    let pool = builder.build_unchecked(manager);
    if let Err(e) = probe(&pool) {
        warn!(error = %e, "liveness probe failed, closing pool");
        drop(pool);
        return Err(e);
    }

    debug!(
        max_open = pool.max_size(),
        max_idle = ?options.max_idle,
        "opened pool"
    );
    Ok(pool)
}

/// Checks out one connection and runs `SELECT 1` on it
pub fn probe(pool: &SqlitePool) -> Result<()> {
    let conn = pool
        .get()
        .map_err(|e| SqlError::Connectivity(e.to_string()))?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(|e| SqlError::Connectivity(e.to_string()))?;
    Ok(())
}
