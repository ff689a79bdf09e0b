//! In-memory data source for tests and simulations.
//!
//! [`SimulationDataSource`] runs every statement against a private in-memory `SQLite`
//! database while letting the caller choose the product name it reports, record each
//! statement that reaches the driver, and make chosen statements fail.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;

use crate::{
    DatabaseError, DatabaseValue, Row,
    connection::{BackendError, Connection, DataSource, RowSource},
    engine::DataSourceMetadata,
    rusqlite::RusqliteDataSource,
};

/// Error returned in place of running a statement that was scheduled to fail.
#[derive(Debug, Error)]
#[error("Simulated failure for '{sql}'")]
pub struct SimulatedFailure {
    pub sql: String,
}

#[derive(Debug, Default)]
struct SimulationState {
    executed: Vec<String>,
    failures: Vec<String>,
}

impl SimulationState {
    /// Records `sql` and consumes the first pending failure whose prefix matches it.
    fn run(&mut self, sql: &str) -> Result<(), BackendError> {
        self.executed.push(sql.to_string());

        if let Some(index) = self
            .failures
            .iter()
            .position(|prefix| sql.starts_with(prefix.as_str()))
        {
            self.failures.remove(index);
            log::debug!("Failing statement '{sql}'");
            return Err(BackendError::Other(Box::new(SimulatedFailure {
                sql: sql.to_string(),
            })));
        }

        Ok(())
    }
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct SimulationDataSource {
    inner: RusqliteDataSource,
    state: Arc<Mutex<SimulationState>>,
}

impl SimulationDataSource {
    /// # Errors
    ///
    /// * If the database connection fails to open in memory
    pub fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            inner: RusqliteDataSource::in_memory()?,
            state: Arc::new(Mutex::new(SimulationState::default())),
        })
    }

    /// A simulation that reports `product_name` as its identity. Statements still run on
    /// `SQLite`, so engine-specific SQL the other product would accept may fail here.
    ///
    /// # Errors
    ///
    /// * If the database connection fails to open in memory
    pub fn impersonating(product_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let mut simulation = Self::new()?;
        simulation.inner = simulation.inner.with_product_name(product_name);
        Ok(simulation)
    }

    /// Makes the next statement starting with `sql_prefix` fail without running.
    pub fn fail_next(&self, sql_prefix: impl Into<String>) {
        self.lock().failures.push(sql_prefix.into());
    }

    /// Every statement that reached the database so far, including ones made to fail.
    /// A batch counts once.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn clear_executed(&self) {
        self.lock().executed.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DataSource for SimulationDataSource {
    fn acquire(&self, auto_commit: bool) -> Result<Box<dyn Connection>, DatabaseError> {
        Ok(Box::new(SimulationConnection {
            inner: self.inner.acquire(auto_commit)?,
            state: self.state.clone(),
        }))
    }

    fn metadata(&self) -> Result<DataSourceMetadata, DatabaseError> {
        self.inner.metadata()
    }
}

struct SimulationConnection {
    inner: Box<dyn Connection>,
    state: Arc<Mutex<SimulationState>>,
}

impl SimulationConnection {
    fn run(&self, sql: &str) -> Result<(), BackendError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .run(sql)
    }
}

impl fmt::Debug for SimulationConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationConnection")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Connection for SimulationConnection {
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<usize, BackendError> {
        self.run(sql)?;
        self.inner.execute(sql, params)
    }

    fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DatabaseValue>],
    ) -> Result<Vec<usize>, BackendError> {
        self.run(sql)?;
        self.inner.execute_batch(sql, param_sets)
    }

    fn fetch(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Vec<Row>, BackendError> {
        self.run(sql)?;
        self.inner.fetch(sql, params)
    }

    fn open_rows(
        self: Box<Self>,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Box<dyn RowSource>, BackendError> {
        self.run(sql)?;
        self.inner.open_rows(sql, params)
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        self.inner.rollback()
    }
}
