use crate::core::db::{ConnectionPair, PoolOptions, DEFAULT_CONNECT_TIMEOUT};
use crate::core::{Result, SqlError};
use crate::sql::Sql;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Connection settings.
///
/// Setting `query_source` opens separate write and read pools.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    pub source: String,
    pub query_source: Option<String>,
    pub max_open: Option<u32>,
    pub max_idle_secs: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

fn default_driver() -> String {
    "sqlite3".to_string()
}

impl DatabaseConfig {
    /// Pool options with unset values left at their defaults
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_open: self.max_open.unwrap_or(0),
            max_idle: Duration::from_secs(self.max_idle_secs.unwrap_or(0)),
            connect_timeout: self
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Opens the connection pair this configuration describes
    pub fn open(&self) -> Result<ConnectionPair> {
        let options = self.pool_options();
        match &self.query_source {
            Some(query_source) => {
                ConnectionPair::open_separated(&self.driver, &self.source, query_source, options)
            }
            None => ConnectionPair::open(&self.driver, &self.source, options),
        }
    }
}

impl FromStr for Config {
    type Err = SqlError;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SqlError::Config(e.to_string()))
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = sqlpair::config::load_config("sqlpair.toml")?;
/// let sql = sqlpair::Sql::from_config(&config)?;
/// # Ok::<(), sqlpair::SqlError>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    content.parse()
}

impl Sql {
    /// Opens a facade with the default error callback from `config`
    pub fn from_config(config: &Config) -> Result<Sql> {
        config.database.open().map(|pair| Sql::new(pair, None))
    }
}
