/// Core Module for sqlpair
///
/// This module contains the error-returning foundation of the crate:
/// connection pairs, row decoding and transactions. The ergonomic,
/// error-swallowing surface in `crate::sql` is built on top of it.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, SqlError};
