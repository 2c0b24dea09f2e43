// Core infrastructure modules
pub mod core;

// Facade and its collaborators
pub mod admin;
pub mod config;
pub mod sink;
pub mod sql;
pub mod sqlite3;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{
    ConnectionPair, Executor, FromRow, PoolOptions, QueryResult, RowResult, TransactionState,
    TxHandle, TxOutcome,
};
pub use crate::core::{Result, SqlError};
pub use crate::sink::{on_error, ErrorCallback, ErrorSink};
pub use crate::sql::{Session, Sql, TxScope};
