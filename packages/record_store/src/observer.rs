//! Hooks for watching the statements the operations issue.
//!
//! An [`OperationFactory`](crate::operation::OperationFactory) reports every statement to
//! its observer before running it. [`LogObserver`] is used unless another one is given.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use crate::{DatabaseValue, engine::Engine};

pub trait Observer: Send + Sync + fmt::Debug {
    fn on_engine(&self, engine: Engine, product_name: &str) {
        let _ = (engine, product_name);
    }

    fn on_statement(&self, sql: &str, params: &[DatabaseValue]) {
        let _ = (sql, params);
    }

    fn on_batch(&self, sql: &str, param_sets: usize) {
        let _ = (sql, param_sets);
    }

    /// Called when a cursor releases its connection.
    fn on_rows(&self, table: &str, rows_read: usize) {
        let _ = (table, rows_read);
    }
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_engine(&self, engine: Engine, product_name: &str) {
        log::debug!("Using {engine} statements for data source '{product_name}'");
    }

    fn on_statement(&self, sql: &str, params: &[DatabaseValue]) {
        log::trace!(
            "Running query: {sql} with params: {:?}",
            params.iter().map(Param).collect::<Vec<_>>()
        );
    }

    fn on_batch(&self, sql: &str, param_sets: usize) {
        log::trace!(
            "Running batch: {sql} with {param_sets} parameter set{}",
            if param_sets == 1 { "" } else { "s" }
        );
    }

    fn on_rows(&self, table: &str, rows_read: usize) {
        log::trace!(
            "Read {rows_read} row{} from {table}",
            if rows_read == 1 { "" } else { "s" }
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedStatement {
    Single {
        sql: String,
        params: Vec<DatabaseValue>,
    },
    Batch {
        sql: String,
        param_sets: usize,
    },
}

impl ObservedStatement {
    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Self::Single { sql, .. } | Self::Batch { sql, .. } => sql,
        }
    }
}

/// Keeps every reported statement in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    statements: Mutex<Vec<ObservedStatement>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn statements(&self) -> Vec<ObservedStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, statement: ObservedStatement) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
    }
}

impl Observer for RecordingObserver {
    fn on_statement(&self, sql: &str, params: &[DatabaseValue]) {
        self.push(ObservedStatement::Single {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    fn on_batch(&self, sql: &str, param_sets: usize) {
        self.push(ObservedStatement::Batch {
            sql: sql.to_string(),
            param_sets,
        });
    }
}

/// Abbreviates serialized payloads in log output.
struct Param<'a>(&'a DatabaseValue);

impl fmt::Debug for Param<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DatabaseValue::Bytes(bytes) => write!(f, "Bytes(<{} bytes>)", bytes.len()),
            value => write!(f, "{value:?}"),
        }
    }
}
