/// Error Module
///
/// This module defines the error taxonomy shared by every layer of the crate.
/// The low-level layer returns these values directly; the ergonomic layer
/// hands them to the error sink instead.
use thiserror::Error;

/// Comprehensive error type for sqlpair.
///
/// The variants follow the lifecycle of a call:
/// - construction (connectivity, configuration)
/// - execution (driver, pool checkout, transactions)
/// - decoding (scan mismatches, missing rows)
#[derive(Error, Debug)]
pub enum SqlError {
    /// Opening a pool or probing it for liveness failed
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Statement execution errors reported by SQLite
    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// A connection could not be checked out of the pool
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Column count or type mismatch while decoding a row
    #[error("Scan error: {0}")]
    Scan(String),

    /// A single-row query matched nothing
    #[error("No rows in result set")]
    NoRows,

    /// BEGIN, COMMIT or ROLLBACK failed
    #[error("Transaction error during {phase}: {source}")]
    Transaction {
        phase: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An identifier was rejected before being spliced into SQL
    #[error("Invalid identifier: {0}")]
    Identifier(String),
}

impl SqlError {
    /// Classifies a raw driver error into the crate taxonomy.
    ///
    /// Decoding failures become `Scan`, an empty single-row result becomes
    /// `NoRows`, everything else stays a `Driver` error.
    pub fn from_driver(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => SqlError::NoRows,
            rusqlite::Error::InvalidColumnType(idx, name, ty) => {
                SqlError::Scan(format!("column {} ({}) has incompatible type {}", idx, name, ty))
            }
            rusqlite::Error::InvalidColumnIndex(idx) => {
                SqlError::Scan(format!("column index {} out of range", idx))
            }
            rusqlite::Error::IntegralValueOutOfRange(idx, value) => {
                SqlError::Scan(format!("column {} value {} out of range", idx, value))
            }
            rusqlite::Error::FromSqlConversionFailure(idx, ty, e) => {
                SqlError::Scan(format!("column {} ({}) conversion failed: {}", idx, ty, e))
            }
            other => SqlError::Driver(other),
        }
    }

    /// Returns true for the "matched nothing" case of single-row reads
    pub fn is_no_rows(&self) -> bool {
        matches!(self, SqlError::NoRows)
    }
}

/// Type alias for Result to use SqlError as the error type.
pub type Result<T> = std::result::Result<T, SqlError>;
