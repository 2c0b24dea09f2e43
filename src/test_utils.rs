/// # Test Utilities Module
///
/// Shared fixtures for unit tests:
/// - temporary database files (in-memory databases are private to a single
///   connection and cannot back a pool)
/// - pool options with short timeouts for failure paths
/// - an error sink recorder
/// - a sample-data fixture

use crate::core::db::PoolOptions;
use crate::core::SqlError;
use crate::sink::{on_error, ErrorCallback};
use crate::sql::{Session, Sql};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Routes tracing output through the test harness
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Creates a temporary directory and the path of a database file inside it.
///
/// Keep the returned `TempDir` alive for as long as the database is used.
pub fn temp_db_path(name: &str) -> (TempDir, String) {
    init_tracing();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir
        .path()
        .join(format!("{}.db", name))
        .to_string_lossy()
        .into_owned();
    (dir, path)
}

/// Pool options that give up quickly, for unreachable-source tests
pub fn fast_options() -> PoolOptions {
    PoolOptions::default().with_connect_timeout(Duration::from_millis(300))
}

/// Polls `condition` for up to two seconds
pub fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// One recorded sink invocation
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub query: String,
    pub args: Vec<String>,
    pub error: String,
    pub no_rows: bool,
}

/// Records every failure reported through its callback
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorLog {
    pub fn callback(&self) -> ErrorCallback {
        let entries = Arc::clone(&self.entries);
        on_error(move |query: &str, args: &[String], err: &SqlError| {
            entries.lock().unwrap().push(ErrorEntry {
                query: query.to_string(),
                args: args.to_vec(),
                error: err.to_string(),
                no_rows: err.is_no_rows(),
            });
        })
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Facade over a temporary database with a small users table
pub struct DatabaseFixture {
    pub dir: TempDir,
    pub path: String,
    pub sql: Sql,
    pub errors: ErrorLog,
}

impl DatabaseFixture {
    /// Opens an empty database with failures recorded in `errors`
    pub fn new(name: &str) -> Self {
        let (dir, path) = temp_db_path(name);
        let sql = Sql::open("sqlite3", &path, PoolOptions::default())
            .expect("Failed to open fixture database");
        let errors = ErrorLog::default();
        sql.set_on_error(Some(errors.callback()));
        DatabaseFixture {
            dir,
            path,
            sql,
            errors,
        }
    }

    /// Opens a database holding users (1, "a") and (2, "b")
    pub fn with_sample_data(name: &str) -> Self {
        let fixture = Self::new(name);
        fixture.sql.exec(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            &[],
        );
        fixture
            .sql
            .exec("INSERT INTO users (name) VALUES ('a'), ('b')", &[]);
        assert!(fixture.errors.is_empty(), "fixture setup failed: {:?}", fixture.errors.entries());
        fixture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_fixture() {
        let fixture = DatabaseFixture::with_sample_data("test_sample");
        let result = fixture.sql.query("SELECT id, name FROM users ORDER BY id", &[]);
        assert_eq!(result.row_count, 2);
        assert!(fixture.dir.path().exists());
        assert!(fixture.path.ends_with("test_sample.db"));
    }

    #[test]
    fn test_error_log_records_failures() {
        let fixture = DatabaseFixture::new("test_log");
        fixture.sql.exec("DROP TABLE nothing_here", &[]);
        let entries = fixture.errors.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "DROP TABLE nothing_here");
        assert!(!entries[0].no_rows);
    }
}
