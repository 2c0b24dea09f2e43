/// Execution Module
///
/// The error-returning exec/query contract. Anything that can lend a
/// connection for writing and one for reading gets the full set of
/// operations, so a connection pair and a live transaction are driven by
/// identical code.

use crate::core::db::query::{
    raw_value, scan_all_as_strings, scan_first_as_strings, scan_one, scan_with_callback,
    FromRow, QueryResult, RowResult, SqliteCursor,
};
use crate::core::{Result, SqlError};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, Statement, ToSql};

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed by the statement (0 for read-only statements)
    pub rows_affected: i64,
    /// Rowid of the most recent successful INSERT on the connection
    pub last_insert_id: i64,
}

/// Low-level exec/query contract.
///
/// Implementors only decide which connection serves writes and which serves
/// reads; every operation is provided on top of that.
pub trait Executor {
    /// Runs `f` against the write connection
    fn with_exec<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>;

    /// Runs `f` against the read connection
    fn with_query<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>;

    /// Executes a write statement on the write connection
    fn exec(&self, sql: &str, args: &[&dyn ToSql]) -> Result<ExecResult> {
        self.with_exec(|conn| exec_on_connection(conn, sql, args))
    }

    /// Executes a write statement and returns the number of changed rows
    fn affected_rows(&self, sql: &str, args: &[&dyn ToSql]) -> Result<i64> {
        self.exec(sql, args).map(|result| result.rows_affected)
    }

    /// Executes an INSERT and returns the new rowid
    fn insert_id(&self, sql: &str, args: &[&dyn ToSql]) -> Result<i64> {
        self.exec(sql, args).map(|result| result.last_insert_id)
    }

    /// Opens a cursor on the read connection and hands it to `f`.
    ///
    /// The cursor cannot outlive the call; it is released when `f` returns.
    fn query<R, F>(&self, sql: &str, args: &[&dyn ToSql], f: F) -> Result<R>
    where
        F: FnOnce(SqliteCursor<'_>) -> Result<R>,
    {
        self.with_query(|conn| {
            let mut stmt = conn.prepare(sql).map_err(SqlError::from_driver)?;
            let columns = column_names(&stmt);
            let rows = stmt.query(args).map_err(SqlError::from_driver)?;
            f(SqliteCursor::new(columns, rows))
        })
    }

    /// Scans the first matching row into `T`.
    ///
    /// # Errors
    ///
    /// `SqlError::NoRows` when nothing matches, `SqlError::Scan` on a
    /// column or type mismatch.
    fn query_one<T: FromRow>(&self, sql: &str, args: &[&dyn ToSql]) -> Result<T> {
        self.with_query(|conn| {
            let mut stmt = conn.prepare(sql).map_err(SqlError::from_driver)?;
            let rows = stmt.query(args).map_err(SqlError::from_driver)?;
            scan_one(rows)
        })
    }

    /// Scans every matching row into `T`, calling `callback` once per row.
    ///
    /// Returns the number of rows delivered; the first scan failure aborts
    /// the remaining rows.
    fn query_array<T, F>(&self, sql: &str, args: &[&dyn ToSql], callback: F) -> Result<usize>
    where
        T: FromRow,
        F: FnMut(T),
    {
        self.with_query(|conn| {
            let mut stmt = conn.prepare(sql).map_err(SqlError::from_driver)?;
            let rows = stmt.query(args).map_err(SqlError::from_driver)?;
            scan_with_callback(rows, callback)
        })
    }

    /// Reads the first row with every column coerced to a string
    fn query_row_strings(&self, sql: &str, args: &[&dyn ToSql]) -> Result<RowResult> {
        self.query(sql, args, |cursor| scan_first_as_strings(cursor))
    }

    /// Reads every row with every column coerced to a string
    fn query_strings(&self, sql: &str, args: &[&dyn ToSql]) -> Result<QueryResult> {
        self.query(sql, args, |cursor| scan_all_as_strings(cursor))
    }
}

/// A bare connection serves both reads and writes
impl Executor for Connection {
    fn with_exec<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        f(self)
    }

    fn with_query<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        f(self)
    }
}

/// Executes one write statement on `conn`.
///
/// Statements that yield rows are stepped to completion. A `RETURNING`
/// clause still reports the rows its statement changed; read-only
/// statements (a `PRAGMA` read, a plain `SELECT`) report zero.
pub fn exec_on_connection(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<ExecResult> {
    let mut stmt = conn.prepare(sql).map_err(SqlError::from_driver)?;
    let rows_affected = if stmt.column_count() > 0 {
        {
            let mut rows = stmt.query(args).map_err(SqlError::from_driver)?;
            while rows.next().map_err(SqlError::from_driver)?.is_some() {}
        }
        if stmt.readonly() {
            0
        } else {
            last_changes(conn)?
        }
    } else {
        stmt.execute(args).map_err(SqlError::from_driver)? as i64
    };
    Ok(ExecResult {
        rows_affected,
        last_insert_id: conn.last_insert_rowid(),
    })
}

/// Rows changed by the most recently completed write on `conn`
fn last_changes(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT changes()", [], |row| row.get(0))
        .map_err(SqlError::from_driver)
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Renders bound arguments as text for error reports
pub fn render_args(args: &[&dyn ToSql]) -> Vec<String> {
    args.iter().map(|arg| render_arg(*arg)).collect()
}

fn render_arg(arg: &dyn ToSql) -> String {
    match arg.to_sql() {
        Ok(ToSqlOutput::Borrowed(value)) => value_text(value),
        Ok(ToSqlOutput::Owned(value)) => value_text(ValueRef::from(&value)),
        Ok(_) => "?".to_string(),
        Err(e) => format!("<unrenderable: {}>", e),
    }
}

fn value_text(value: ValueRef<'_>) -> String {
    match raw_value(value) {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        conn
    }

    #[test]
    fn test_insert_id_and_affected_rows() {
        let db = setup();
        assert_eq!(db.insert_id("INSERT INTO users (name) VALUES (?)", params!["alice"]).unwrap(), 1);
        assert_eq!(db.insert_id("INSERT INTO users (name) VALUES (?)", params!["bob"]).unwrap(), 2);
        assert_eq!(db.affected_rows("UPDATE users SET name = name || '!'", &[]).unwrap(), 2);
    }

    #[test]
    fn test_exec_accepts_row_returning_statements() {
        let db = setup();
        let result = db.exec("PRAGMA user_version = 7", &[]).unwrap();
        assert_eq!(result.rows_affected, 0);
        let result = db.exec("PRAGMA user_version", &[]).unwrap();
        assert_eq!(result.rows_affected, 0);
    }

    #[test]
    fn test_returning_statements_count_changed_rows() {
        let db = setup();
        for name in ["a", "b", "c"] {
            db.exec("INSERT INTO users (name) VALUES (?)", params![name]).unwrap();
        }

        let updated = db
            .affected_rows("UPDATE users SET name = upper(name) WHERE id > 1 RETURNING id", &[])
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = db
            .affected_rows("DELETE FROM users WHERE id < 3 RETURNING id", &[])
            .unwrap();
        assert_eq!(deleted, 2);

        let (remaining,): (i64,) = db.query_one("SELECT COUNT(*) FROM users", &[]).unwrap();
        assert_eq!(remaining, 1);
        assert_eq!(db.affected_rows("SELECT id FROM users", &[]).unwrap(), 0);
    }

    #[test]
    fn test_query_one_and_no_rows() {
        let db = setup();
        db.exec("INSERT INTO users (name) VALUES ('alice')", &[]).unwrap();

        let (id, name): (i64, String) = db
            .query_one("SELECT id, name FROM users WHERE name = ?", params!["alice"])
            .unwrap();
        assert_eq!((id, name.as_str()), (1, "alice"));

        let missing = db.query_one::<(i64,)>("SELECT id FROM users WHERE name = ?", params!["zed"]);
        assert!(missing.unwrap_err().is_no_rows());
    }

    #[test]
    fn test_query_array_collects_rows() {
        let db = setup();
        for name in ["a", "b", "c"] {
            db.exec("INSERT INTO users (name) VALUES (?)", params![name]).unwrap();
        }
        let mut names = Vec::new();
        let count = db
            .query_array("SELECT name FROM users ORDER BY id", &[], |(name,): (String,)| {
                names.push(name)
            })
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_strings() {
        let db = setup();
        db.exec("INSERT INTO users (name) VALUES ('a'), ('b')", &[]).unwrap();

        let all = db.query_strings("SELECT id, name FROM users ORDER BY id", &[]).unwrap();
        assert_eq!(all.columns, vec!["id", "name"]);
        assert_eq!(all.rows, vec![vec!["1", "a"], vec!["2", "b"]]);

        let first = db.query_row_strings("SELECT name, id FROM users ORDER BY id", &[]).unwrap();
        assert_eq!(first.columns, vec!["name", "id"]);
        assert_eq!(first.values, vec!["a", "1"]);
    }

    #[test]
    fn test_driver_error_is_returned() {
        let db = setup();
        match db.exec("INSERT INTO nonexistent_table VALUES (1)", &[]) {
            Err(SqlError::Driver(e)) => assert!(e.to_string().contains("no such table")),
            other => panic!("Expected Driver error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_args() {
        let rendered = render_args(params![1, "two", 3.5, Option::<i64>::None]);
        assert_eq!(rendered, vec!["1", "two", "3.5", "NULL"]);
    }
}
