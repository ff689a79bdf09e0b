//! The seam between operations and a concrete database driver.
//!
//! A [`DataSource`] hands out [`Connection`]s. Operations acquire one connection per
//! call and drop it before returning; a read that returns a cursor moves its connection
//! into the [`RowSource`] instead, so the connection lives until the cursor is closed.

use std::{collections::VecDeque, fmt};

use thiserror::Error;

use crate::{DatabaseError, DatabaseValue, Row, engine::DataSourceMetadata};

/// Failure reported by a driver.
#[derive(Debug, Error)]
pub enum BackendError {
    #[cfg(feature = "sqlite-rusqlite")]
    #[error(transparent)]
    Rusqlite(#[from] ::rusqlite::Error),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

pub trait DataSource: Send + Sync + fmt::Debug {
    /// Opens a connection. With `auto_commit` disabled, statements run inside a
    /// transaction until [`Connection::commit`] is called; dropping the connection
    /// first discards them.
    ///
    /// # Errors
    ///
    /// * If a connection cannot be established
    fn acquire(&self, auto_commit: bool) -> Result<Box<dyn Connection>, DatabaseError>;

    /// Identity of the database product behind this source.
    ///
    /// # Errors
    ///
    /// * If the product cannot be queried
    fn metadata(&self) -> Result<DataSourceMetadata, DatabaseError>;
}

pub trait Connection: Send + fmt::Debug {
    /// Runs a single statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<usize, BackendError>;

    /// Runs one prepared statement once per parameter set, all or nothing.
    ///
    /// # Errors
    ///
    /// * If any execution fails; no parameter set is applied in that case
    fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DatabaseValue>],
    ) -> Result<Vec<usize>, BackendError>;

    /// Runs a query and collects its rows.
    ///
    /// # Errors
    ///
    /// * If the query fails
    fn fetch(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Vec<Row>, BackendError>;

    /// Runs a query and hands its rows, together with this connection, to the
    /// returned source.
    ///
    /// # Errors
    ///
    /// * If the query fails
    fn open_rows(
        self: Box<Self>,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Box<dyn RowSource>, BackendError>;

    /// # Errors
    ///
    /// * If the commit fails
    fn commit(&mut self) -> Result<(), BackendError>;

    /// # Errors
    ///
    /// * If the rollback fails
    fn rollback(&mut self) -> Result<(), BackendError>;
}

/// Rows of an open query, produced one at a time.
pub trait RowSource: Send + fmt::Debug {
    /// # Errors
    ///
    /// * If the next row cannot be read
    fn next_row(&mut self) -> Result<Option<Row>, BackendError>;

    /// Releases the rows and the connection behind them. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// * If the connection fails to release
    fn close(&mut self) -> Result<(), BackendError>;
}

/// A [`RowSource`] over rows already read from the database.
///
/// Keeps the connection that produced the rows until closed.
pub struct BufferedRows {
    rows: VecDeque<Row>,
    connection: Option<Box<dyn Connection>>,
}

impl BufferedRows {
    #[must_use]
    pub fn new(rows: Vec<Row>, connection: Option<Box<dyn Connection>>) -> Self {
        Self {
            rows: rows.into(),
            connection,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.connection.is_none()
    }
}

impl fmt::Debug for BufferedRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedRows")
            .field("remaining", &self.rows.len())
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl RowSource for BufferedRows {
    fn next_row(&mut self) -> Result<Option<Row>, BackendError> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.rows.clear();
        if let Some(connection) = self.connection.take() {
            log::trace!("Releasing cursor connection {connection:?}");
        }
        Ok(())
    }
}
