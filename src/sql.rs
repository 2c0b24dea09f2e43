/// Ergonomic SQL Facade
///
/// [`Sql`] composes a [`ConnectionPair`] with an [`ErrorSink`]. Its operations
/// never return errors: a failing call yields an empty or zero value and the
/// failure goes to the sink. Code inside a transaction uses the same
/// [`Session`] methods through [`TxScope`].
///
/// Callers that need control flow from errors should use the [`Executor`]
/// methods of [`Sql::pair`] instead.

use crate::core::db::{
    render_args, ConnectionPair, Executor, FromRow, PoolOptions, QueryResult, RowResult,
    SqlitePool, TransactionState, TxHandle, TxOutcome,
};
use crate::core::{Result, SqlError};
use crate::sink::{ErrorCallback, ErrorSink};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;

/// The error-swallowing operation set shared by [`Sql`] and [`TxScope`]
pub trait Session {
    type Exec: Executor;

    /// The error-returning layer underneath
    fn executor(&self) -> &Self::Exec;

    /// Where failures are reported
    fn sink(&self) -> &ErrorSink;

    /// Reports a failed statement to the sink
    fn report(&self, sql: &str, args: &[&dyn ToSql], err: &SqlError) {
        self.sink().report(sql, &render_args(args), err);
    }

    /// Executes a write statement
    fn exec(&self, sql: &str, args: &[&dyn ToSql]) {
        if let Err(e) = self.executor().exec(sql, args) {
            self.report(sql, args, &e);
        }
    }

    /// Executes a write statement and returns the changed row count, 0 on failure
    fn affected_rows(&self, sql: &str, args: &[&dyn ToSql]) -> i64 {
        self.executor().affected_rows(sql, args).unwrap_or_else(|e| {
            self.report(sql, args, &e);
            0
        })
    }

    /// Executes an INSERT and returns the new rowid, 0 on failure
    fn insert_id(&self, sql: &str, args: &[&dyn ToSql]) -> i64 {
        self.executor().insert_id(sql, args).unwrap_or_else(|e| {
            self.report(sql, args, &e);
            0
        })
    }

    /// Scans the first matching row into `T`.
    ///
    /// Returns `None` on any failure, including no matching row; the sink
    /// sees `SqlError::NoRows` in that case.
    fn query_one<T: FromRow>(&self, sql: &str, args: &[&dyn ToSql]) -> Option<T> {
        match self.executor().query_one(sql, args) {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(sql, args, &e);
                None
            }
        }
    }

    /// Calls `callback` once per matching row and returns how many rows were delivered.
    ///
    /// A scan failure stops the iteration; rows delivered before it still count.
    fn query_array<T, F>(&self, sql: &str, args: &[&dyn ToSql], mut callback: F) -> usize
    where
        T: FromRow,
        F: FnMut(T),
    {
        let mut delivered = 0;
        let result = self.executor().query_array(sql, args, |value: T| {
            delivered += 1;
            callback(value)
        });
        if let Err(e) = result {
            self.report(sql, args, &e);
        }
        delivered
    }

    /// First row with every column coerced to a string.
    ///
    /// No matching row is not a failure: the values are simply empty.
    fn query_row(&self, sql: &str, args: &[&dyn ToSql]) -> RowResult {
        self.executor().query_row_strings(sql, args).unwrap_or_else(|e| {
            self.report(sql, args, &e);
            RowResult::default()
        })
    }

    /// Every row with every column coerced to a string
    fn query(&self, sql: &str, args: &[&dyn ToSql]) -> QueryResult {
        self.executor().query_strings(sql, args).unwrap_or_else(|e| {
            self.report(sql, args, &e);
            QueryResult::default()
        })
    }
}

/// The ergonomic facade over a connection pair
#[derive(Debug)]
pub struct Sql {
    pair: ConnectionPair,
    sink: ErrorSink,
}

impl Sql {
    /// Wraps `pair`; `None` installs the default logging callback
    pub fn new(pair: ConnectionPair, callback: Option<ErrorCallback>) -> Self {
        Sql {
            pair,
            sink: ErrorSink::new(callback),
        }
    }

    /// Opens a shared pair from `source`, see [`ConnectionPair::open`]
    pub fn open(driver: &str, source: &str, options: PoolOptions) -> Result<Self> {
        ConnectionPair::open(driver, source, options).map(|pair| Sql::new(pair, None))
    }

    /// Opens a shared pair from a pre-built manager, see [`ConnectionPair::open_with_manager`]
    pub fn open_with_manager(
        driver: &str,
        manager: SqliteConnectionManager,
        options: PoolOptions,
    ) -> Result<Self> {
        ConnectionPair::open_with_manager(driver, manager, options).map(|pair| Sql::new(pair, None))
    }

    /// Opens a split pair, see [`ConnectionPair::open_separated`]
    pub fn open_separated(
        driver: &str,
        exec_source: &str,
        query_source: &str,
        options: PoolOptions,
    ) -> Result<Self> {
        ConnectionPair::open_separated(driver, exec_source, query_source, options)
            .map(|pair| Sql::new(pair, None))
    }

    /// The error-returning layer
    pub fn pair(&self) -> &ConnectionPair {
        &self.pair
    }

    pub fn driver(&self) -> &str {
        self.pair.driver()
    }

    pub fn exec_pool(&self) -> &SqlitePool {
        self.pair.exec_pool()
    }

    pub fn query_pool(&self) -> &SqlitePool {
        self.pair.query_pool()
    }

    /// Replaces the error callback; `None` restores the default
    pub fn set_on_error(&self, callback: Option<ErrorCallback>) {
        self.sink.set(callback);
    }

    /// Runs `handler` in a transaction and commits or rolls back on its outcome.
    ///
    /// BEGIN, COMMIT and ROLLBACK failures are reported to the sink with the
    /// phase as the query text. Returns the state the transaction ended in;
    /// `Idle` means the handler never ran.
    pub fn transact<F>(&self, handler: F) -> TransactionState
    where
        F: FnOnce(&TxScope<'_, '_>) -> TxOutcome,
    {
        let sink = &self.sink;
        let result = self
            .pair
            .transact(|tx| Ok(handler(&TxScope { tx, sink })));
        match result {
            Ok(state) => state,
            Err(e) => {
                let phase = match &e {
                    SqlError::Transaction { phase, .. } => *phase,
                    _ => "BEGIN",
                };
                sink.report(phase, &[], &e);
                if phase == "BEGIN" {
                    TransactionState::Idle
                } else {
                    TransactionState::RolledBack
                }
            }
        }
    }

    /// Closes the underlying pools, see [`ConnectionPair::close`]
    pub fn close(self) -> usize {
        self.pair.close()
    }
}

impl Session for Sql {
    type Exec = ConnectionPair;

    fn executor(&self) -> &ConnectionPair {
        &self.pair
    }

    fn sink(&self) -> &ErrorSink {
        &self.sink
    }
}

/// Transaction-scoped [`Session`]; failures go to the owning facade's sink
pub struct TxScope<'a, 'tx> {
    tx: &'a TxHandle<'tx>,
    sink: &'a ErrorSink,
}

impl<'a, 'tx> Session for TxScope<'a, 'tx> {
    type Exec = TxHandle<'tx>;

    fn executor(&self) -> &TxHandle<'tx> {
        self.tx
    }

    fn sink(&self) -> &ErrorSink {
        self.sink
    }
}
