/// Connection Management Module
///
/// This module provides the exec/query connection pair: one pool serves
/// writes and transactions, one serves reads, and the two may be the same.

use crate::core::db::executor::Executor;
use crate::core::db::pool::{open_pool, source_manager, PoolOptions, SqlitePool};
use crate::core::{Result, SqlError};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::fmt;
use tracing::{debug, warn};

/// Driver names this crate can open
pub const SUPPORTED_DRIVERS: &[&str] = &["sqlite3", "sqlite"];

/// The pools behind a connection pair
#[derive(Clone)]
pub enum Handles {
    /// One pool serves both reads and writes
    Shared(SqlitePool),
    /// Writes and reads go to independent pools (e.g. primary/replica)
    Split {
        exec: SqlitePool,
        query: SqlitePool,
    },
}

impl Handles {
    /// The pool used for writes and transaction begin
    pub fn exec(&self) -> &SqlitePool {
        match self {
            Handles::Shared(pool) => pool,
            Handles::Split { exec, .. } => exec,
        }
    }

    /// The pool used for reads
    pub fn query(&self) -> &SqlitePool {
        match self {
            Handles::Shared(pool) => pool,
            Handles::Split { query, .. } => query,
        }
    }
}

/// A write handle and a read handle with a common driver.
///
/// Dropping the pair closes its pools; [`ConnectionPair::close`] does the
/// same explicitly and reports how many distinct pools were released.
pub struct ConnectionPair {
    handles: Handles,
    driver: String,
}

impl fmt::Debug for ConnectionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.handles {
            Handles::Shared(_) => "shared",
            Handles::Split { .. } => "split",
        };
        f.debug_struct("ConnectionPair")
            .field("driver", &self.driver)
            .field("handles", &layout)
            .finish()
    }
}

fn check_driver(driver: &str) -> Result<()> {
    if SUPPORTED_DRIVERS.contains(&driver) {
        Ok(())
    } else {
        Err(SqlError::Config(format!(
            "unknown driver {:?} (supported: {})",
            driver,
            SUPPORTED_DRIVERS.join(", ")
        )))
    }
}

impl ConnectionPair {
    /// Opens one pool from `source` and shares it for reads and writes.
    ///
    /// # Errors
    ///
    /// `SqlError::Config` for an unknown driver, `SqlError::Connectivity` if
    /// the liveness probe fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sqlpair::core::db::{ConnectionPair, PoolOptions};
    ///
    /// let pair = ConnectionPair::open("sqlite3", "app.db", PoolOptions::default())?;
    /// # Ok::<(), sqlpair::core::SqlError>(())
    /// ```
    pub fn open(driver: &str, source: &str, options: PoolOptions) -> Result<Self> {
        check_driver(driver)?;
        let pool = open_pool(source_manager(source), options)?;
        Ok(ConnectionPair::shared(driver, pool))
    }

    /// Opens a shared pair from a pre-built connection manager.
    ///
    /// Use this when connections need custom flags or initialization.
    pub fn open_with_manager(
        driver: &str,
        manager: SqliteConnectionManager,
        options: PoolOptions,
    ) -> Result<Self> {
        check_driver(driver)?;
        let pool = open_pool(manager, options)?;
        Ok(ConnectionPair::shared(driver, pool))
    }

    /// Opens independent write and read pools.
    ///
    /// If the read pool cannot be opened, the already-opened write pool is
    /// closed before the error is returned.
    pub fn open_separated(
        driver: &str,
        exec_source: &str,
        query_source: &str,
        options: PoolOptions,
    ) -> Result<Self> {
        check_driver(driver)?;
        ConnectionPair::split(
            driver,
            source_manager(exec_source),
            source_manager(query_source),
            options,
        )
    }

    fn split(
        driver: &str,
        exec_manager: SqliteConnectionManager,
        query_manager: SqliteConnectionManager,
        options: PoolOptions,
    ) -> Result<Self> {
        let exec = open_pool(exec_manager, options)?;
        let query = match open_pool(query_manager, options) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "read pool unreachable, closing write pool");
                drop(exec);
                return Err(e);
            }
        };
        debug!(driver, "opened split connection pair");
        Ok(ConnectionPair {
            handles: Handles::Split { exec, query },
            driver: driver.to_string(),
        })
    }

    fn shared(driver: &str, pool: SqlitePool) -> Self {
        debug!(driver, "opened shared connection pair");
        ConnectionPair {
            handles: Handles::Shared(pool),
            driver: driver.to_string(),
        }
    }

    /// Name of the driver the pair was opened with
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// The pools behind this pair
    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    /// The pool serving writes
    pub fn exec_pool(&self) -> &SqlitePool {
        self.handles.exec()
    }

    /// The pool serving reads
    pub fn query_pool(&self) -> &SqlitePool {
        self.handles.query()
    }

    /// Whether reads and writes use different pools
    pub fn is_split(&self) -> bool {
        matches!(self.handles, Handles::Split { .. })
    }

    /// Closes the pair and returns the number of distinct pools released.
    ///
    /// A shared pool is released exactly once. Clones of the pools obtained
    /// through the accessors keep their connections alive until dropped.
    pub fn close(self) -> usize {
        let released = match self.handles {
            Handles::Shared(pool) => {
                drop(pool);
                1
            }
            Handles::Split { exec, query } => {
                drop(exec);
                drop(query);
                2
            }
        };
        debug!(driver = %self.driver, released, "closed connection pair");
        released
    }
}

impl Executor for ConnectionPair {
    fn with_exec<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.exec_pool().get()?;
        f(&conn)
    }

    fn with_query<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.query_pool().get()?;
        f(&conn)
    }
}
