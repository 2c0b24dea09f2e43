/// Transaction Module
///
/// Runs a handler inside a transaction on the write pool and commits or
/// rolls back according to what the handler returns.

use crate::core::db::connection::ConnectionPair;
use crate::core::db::executor::Executor;
use crate::core::{Result, SqlError};
use rusqlite::{Connection, Transaction};
use tracing::{debug, warn};

/// Represents the lifecycle of one transaction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Not started, or BEGIN failed
    #[default]
    Idle,
    /// BEGIN succeeded and the handler is running
    Begun,
    /// Effects are durable
    Committed,
    /// Effects were discarded
    RolledBack,
}

/// What a transaction handler asks for when it finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Commit,
    Rollback,
}

impl From<bool> for TxOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            TxOutcome::Commit
        } else {
            TxOutcome::Rollback
        }
    }
}

/// Transaction-scoped handle: reads and writes both run on the live transaction.
///
/// It does not offer `transact`, so transactions cannot be nested.
pub struct TxHandle<'tx> {
    tx: &'tx Transaction<'tx>,
}

impl Executor for TxHandle<'_> {
    fn with_exec<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        f(self.tx)
    }

    fn with_query<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        f(self.tx)
    }
}

/// Logs when a handler unwinds; the transaction itself rolls back on drop
struct UnwindGuard;

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("transaction handler panicked, rolling back");
        }
    }
}

impl ConnectionPair {
    /// Runs `handler` inside a transaction on the write pool.
    ///
    /// `Ok(TxOutcome::Commit)` commits; `Ok(TxOutcome::Rollback)` or an error
    /// rolls back. If the handler panics, the transaction is rolled back as
    /// the stack unwinds.
    ///
    /// # Returns
    ///
    /// The terminal state (`Committed` or `RolledBack`). A handler error is
    /// returned after the rollback.
    ///
    /// # Errors
    ///
    /// `SqlError::Transaction` if BEGIN, COMMIT or ROLLBACK fails; the handler
    /// is not invoked when BEGIN fails.
    pub fn transact<F>(&self, handler: F) -> Result<TransactionState>
    where
        F: FnOnce(&TxHandle<'_>) -> Result<TxOutcome>,
    {
        let mut conn = self.exec_pool().get()?;
        let tx = conn
            .transaction()
            .map_err(|source| SqlError::Transaction { phase: "BEGIN", source })?;
        let _guard = UnwindGuard;
        debug!(state = ?TransactionState::Begun, "transaction begun");

        let outcome = handler(&TxHandle { tx: &tx });
        match outcome {
            Ok(TxOutcome::Commit) => {
                tx.commit()
                    .map_err(|source| SqlError::Transaction { phase: "COMMIT", source })?;
                debug!(state = ?TransactionState::Committed, "transaction committed");
                Ok(TransactionState::Committed)
            }
            Ok(TxOutcome::Rollback) => {
                tx.rollback()
                    .map_err(|source| SqlError::Transaction { phase: "ROLLBACK", source })?;
                debug!(state = ?TransactionState::RolledBack, "transaction rolled back");
                Ok(TransactionState::RolledBack)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback after handler error failed");
                }
                debug!(error = %e, "transaction rolled back after handler error");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::PoolOptions;
    use crate::test_utils::temp_db_path;
    use rusqlite::params;
    use std::panic::{self, AssertUnwindSafe};

    fn setup(name: &str) -> (tempfile::TempDir, ConnectionPair) {
        let (dir, path) = temp_db_path(name);
        let pair = ConnectionPair::open("sqlite3", &path, PoolOptions::default()).unwrap();
        pair.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])
            .unwrap();
        (dir, pair)
    }

    fn count(pair: &ConnectionPair) -> i64 {
        pair.query_one::<(i64,)>("SELECT COUNT(*) FROM items", &[]).unwrap().0
    }

    #[test]
    fn test_commit_makes_effects_visible() {
        let (_dir, pair) = setup("tx_commit");
        let state = pair
            .transact(|tx| {
                tx.exec("INSERT INTO items (name) VALUES (?)", params!["a"])?;
                tx.exec("INSERT INTO items (name) VALUES (?)", params!["b"])?;
                let (inside,): (i64,) = tx.query_one("SELECT COUNT(*) FROM items", &[])?;
                assert_eq!(inside, 2);
                Ok(TxOutcome::Commit)
            })
            .unwrap();

        assert_eq!(state, TransactionState::Committed);
        assert_eq!(count(&pair), 2);
    }

    #[test]
    fn test_rollback_outcome_discards_effects() {
        let (_dir, pair) = setup("tx_rollback");
        let state = pair
            .transact(|tx| {
                tx.exec("INSERT INTO items (name) VALUES ('a')", &[])?;
                Ok(TxOutcome::Rollback)
            })
            .unwrap();

        assert_eq!(state, TransactionState::RolledBack);
        assert_eq!(count(&pair), 0);
    }

    #[test]
    fn test_handler_error_rolls_back_and_propagates() {
        let (_dir, pair) = setup("tx_error");
        let result = pair.transact(|tx| {
            tx.exec("INSERT INTO items (name) VALUES ('a')", &[])?;
            tx.exec("INSERT INTO items (name) VALUES (NULL)", &[])?;
            Ok(TxOutcome::Commit)
        });

        assert!(matches!(result, Err(SqlError::Driver(_))));
        assert_eq!(count(&pair), 0);
    }

    #[test]
    fn test_panicking_handler_rolls_back() {
        let (_dir, pair) = setup("tx_panic");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pair.transact(|tx| {
                tx.exec("INSERT INTO items (name) VALUES ('a')", &[])?;
                panic!("handler failure");
            })
        }));

        assert!(result.is_err());
        assert_eq!(count(&pair), 0);
    }

    #[test]
    fn test_outcome_from_bool() {
        assert_eq!(TxOutcome::from(true), TxOutcome::Commit);
        assert_eq!(TxOutcome::from(false), TxOutcome::Rollback);
        assert_eq!(TransactionState::default(), TransactionState::Idle);
    }
}
