//! SQLite shortcuts: open a facade by path with the driver name filled in.

use crate::core::db::{with_pragmas, PoolOptions};
use crate::core::Result;
use crate::sql::Sql;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

/// Driver name used by every shortcut in this module
pub const DRIVER: &str = "sqlite3";

/// Opens a shared pair on `path` with default pool settings
pub fn open(path: &str) -> Result<Sql> {
    Sql::open(DRIVER, path, PoolOptions::default())
}

/// Opens a shared pair on `path` with explicit open flags.
///
/// Handy for read-only replicas or databases that must already exist.
pub fn open_with_flags(path: &str, flags: OpenFlags, options: PoolOptions) -> Result<Sql> {
    let manager = with_pragmas(SqliteConnectionManager::file(path).with_flags(flags));
    Sql::open_with_manager(DRIVER, manager, options)
}

/// Opens a write pool on `exec_path` and a read pool on `query_path`
pub fn open_separated(exec_path: &str, query_path: &str, options: PoolOptions) -> Result<Sql> {
    Sql::open_separated(DRIVER, exec_path, query_path, options)
}
