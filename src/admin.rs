//! Database administration helpers.
//!
//! These helpers only issue SQL through the public exec/query surface.
//! Identifiers cannot be bound as parameters, so every caller-supplied name is
//! quoted with [`quote_identifier`] before it is spliced into a statement.

use crate::core::db::Executor;
use crate::core::{Result, SqlError};
use crate::sql::Session;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Aliases accepted by ATTACH/DETACH
static SCHEMA_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("schema alias pattern"));

/// Schemas SQLite reserves for itself
const RESERVED_SCHEMAS: &[&str] = &["main", "temp"];

/// An entry of `PRAGMA database_list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Database {
    pub name: String,
    pub file: String,
}

/// Quotes `name` as a SQL identifier, doubling embedded quotes.
///
/// # Errors
///
/// Empty names and names containing NUL are rejected.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(SqlError::Identifier(format!("{:?}", name)));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Checks that `alias` is a plain, non-reserved schema alias
pub fn validate_schema_alias(alias: &str) -> Result<&str> {
    if !SCHEMA_ALIAS.is_match(alias) || RESERVED_SCHEMAS.contains(&alias.to_lowercase().as_str()) {
        return Err(SqlError::Identifier(format!("unusable schema alias {:?}", alias)));
    }
    Ok(alias)
}

/// Attaches the database file at `path` under `alias`.
///
/// ATTACH is scoped to the connection that runs it; on a pool it is only
/// reliable with `max_open = 1`.
pub fn attach_database<E: Executor>(db: &E, path: &str, alias: &str) -> Result<()> {
    let alias = quote_identifier(validate_schema_alias(alias)?)?;
    db.exec(&format!("ATTACH DATABASE ? AS {}", alias), &[&path])?;
    Ok(())
}

/// Detaches a database previously attached under `alias`
pub fn detach_database<E: Executor>(db: &E, alias: &str) -> Result<()> {
    let alias = quote_identifier(validate_schema_alias(alias)?)?;
    db.exec(&format!("DETACH DATABASE {}", alias), &[])?;
    Ok(())
}

/// Drops `table` from `schema` if it exists
pub fn drop_table<E: Executor>(db: &E, schema: &str, table: &str) -> Result<()> {
    let sql = format!(
        "DROP TABLE IF EXISTS {}.{}",
        quote_identifier(schema)?,
        quote_identifier(table)?
    );
    db.exec(&sql, &[])?;
    Ok(())
}

/// Lists the databases visible to the read connection
pub fn list_databases<S: Session>(db: &S) -> Vec<Database> {
    let mut databases = Vec::new();
    db.query_array(
        "SELECT name, file FROM pragma_database_list ORDER BY seq",
        &[],
        |(name, file): (String, Option<String>)| {
            databases.push(Database {
                name,
                file: file.unwrap_or_default(),
            })
        },
    );
    databases
}

/// Lists user tables in `schema`, sorted by name
pub fn list_tables<S: Session>(db: &S, schema: &str) -> Vec<String> {
    let schema = match quote_identifier(schema) {
        Ok(quoted) => quoted,
        Err(e) => {
            db.report("list_tables", &[&schema], &e);
            return Vec::new();
        }
    };
    let sql = format!(
        "SELECT name FROM {}.sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        schema
    );
    let mut tables = Vec::new();
    db.query_array(&sql, &[], |(name,): (String,)| tables.push(name));
    tables
}
