#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Builds the [`DataSource`] a record store runs on from configuration.
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = record_store_connection::Config::from_env()?;
//! let data_source = record_store_connection::init(&config)?;
//! let factory = record_store::OperationFactory::new(data_source)?;
//! # Ok(())
//! # }
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use record_store::DataSource;
use thiserror::Error;

pub const SQLITE_PATH_VAR: &str = "RECORD_STORE_SQLITE_PATH";
pub const ENGINE_VAR: &str = "RECORD_STORE_ENGINE";
pub const BUSY_TIMEOUT_VAR: &str = "RECORD_STORE_BUSY_TIMEOUT_MS";

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A `SQLite` database file, or a private in-memory database when `path` is `None`.
    Sqlite { path: Option<PathBuf> },
    /// An in-memory simulation that records and can fail statements.
    Simulator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    /// Product name the data source reports instead of its own, which selects the
    /// engine the operations are built for.
    pub engine_override: Option<String>,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite { path: None },
            engine_override: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    #[error("Invalid value '{value}' for {name}: {message}")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// * `RECORD_STORE_SQLITE_PATH`: database file; an in-memory database when unset
    /// * `RECORD_STORE_ENGINE`: product name to report instead of `SQLite`
    /// * `RECORD_STORE_BUSY_TIMEOUT_MS`: how long to wait on a locked database
    ///
    /// # Errors
    ///
    /// * If a variable is set to an empty or malformed value
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// * If a variable is set to an empty or malformed value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup(SQLITE_PATH_VAR) {
            config.backend = Backend::Sqlite {
                path: Some(PathBuf::from(non_empty(SQLITE_PATH_VAR, path)?)),
            };
        }

        if let Some(engine) = lookup(ENGINE_VAR) {
            config.engine_override = Some(non_empty(ENGINE_VAR, engine)?);
        }

        if let Some(timeout) = lookup(BUSY_TIMEOUT_VAR) {
            let millis = timeout
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: BUSY_TIMEOUT_VAR,
                    value: timeout.clone(),
                    message: e.to_string(),
                })?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        log::debug!("Loaded record store config: {config:?}");

        Ok(config)
    }
}

fn non_empty(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty { name });
    }
    Ok(value)
}

#[derive(Debug, Error)]
pub enum InitDbError {
    #[cfg(feature = "sqlite-rusqlite")]
    #[error(transparent)]
    InitSqlite(#[from] InitSqliteError),
    #[cfg(feature = "simulator")]
    #[error(transparent)]
    InitSimulator(record_store::DatabaseError),
    #[error("Backend {0:?} is not enabled in this build")]
    BackendDisabled(Backend),
}

/// # Errors
///
/// * If the configured backend is not enabled
/// * If the database cannot be opened
pub fn init(config: &Config) -> Result<Arc<dyn DataSource>, InitDbError> {
    match &config.backend {
        #[cfg(feature = "sqlite-rusqlite")]
        Backend::Sqlite { path } => {
            let mut data_source =
                open_sqlite(path.as_deref())?.with_busy_timeout(config.busy_timeout);
            if let Some(product_name) = &config.engine_override {
                data_source = data_source.with_product_name(product_name);
            }
            Ok(Arc::new(data_source))
        }
        #[cfg(feature = "simulator")]
        Backend::Simulator => {
            let simulation = match &config.engine_override {
                Some(product_name) => {
                    record_store::simulator::SimulationDataSource::impersonating(product_name)
                }
                None => record_store::simulator::SimulationDataSource::new(),
            }
            .map_err(InitDbError::InitSimulator)?;
            Ok(Arc::new(simulation))
        }
        #[allow(unreachable_patterns)]
        backend => Err(InitDbError::BackendDisabled(backend.clone())),
    }
}

#[cfg(feature = "sqlite-rusqlite")]
#[derive(Debug, Error)]
pub enum InitSqliteError {
    #[error(transparent)]
    Database(#[from] record_store::DatabaseError),
    #[error("Failed to create database directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opens the `SQLite` database at `path`, creating missing parent directories, or a
/// private in-memory database when `path` is `None`.
///
/// # Errors
///
/// * If the parent directory cannot be created
/// * If the database cannot be opened
#[cfg(feature = "sqlite-rusqlite")]
pub fn init_sqlite_rusqlite(path: Option<&Path>) -> Result<Arc<dyn DataSource>, InitSqliteError> {
    Ok(Arc::new(open_sqlite(path)?))
}

#[cfg(feature = "sqlite-rusqlite")]
fn open_sqlite(
    path: Option<&Path>,
) -> Result<record_store::rusqlite::RusqliteDataSource, InitSqliteError> {
    let Some(path) = path else {
        log::debug!("Opening in-memory SQLite database");
        return Ok(record_store::rusqlite::RusqliteDataSource::in_memory()?);
    };

    if let Some(dir) = path
        .parent()
        .filter(|x| !x.as_os_str().is_empty() && !x.is_dir())
    {
        std::fs::create_dir_all(dir).map_err(|source| InitSqliteError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    log::debug!("Opening SQLite database at {}", path.display());

    Ok(record_store::rusqlite::RusqliteDataSource::open(path)?)
}
