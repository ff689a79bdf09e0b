#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Maps serializable records onto rows of a relational table.
//!
//! A [`table::TableSpec`] describes how a record kind is laid out: which column holds
//! its identifier, which columns hold values extracted from it, and which column holds
//! the serialized record itself. An [`operation::OperationFactory`] bound to a
//! [`connection::DataSource`] then produces the create, write, read and delete
//! operations for that table, choosing engine-specific SQL where the engine offers a
//! native upsert.
//!
//! The crate is synchronous. Each operation acquires a connection, performs its work
//! and releases the connection before returning, except for the read operations
//! returning a [`cursor::RecordCursor`], which keep their connection until the cursor
//! is exhausted or closed.

pub mod codec;
pub mod connection;
pub mod cursor;
pub mod engine;
pub mod id;
pub mod observer;
pub mod operation;
pub mod query;
#[cfg(feature = "sqlite-rusqlite")]
pub mod rusqlite;
pub mod schema;
#[cfg(feature = "simulator")]
pub mod simulator;
pub mod sql;
pub mod table;
pub mod timestamp;

use codec::CorruptRecordError;
use connection::BackendError;
use cursor::CursorError;
use schema::DataType;
use thiserror::Error;

pub use codec::Message;
pub use connection::{Connection, DataSource, RowSource};
pub use cursor::RecordCursor;
pub use engine::{DataSourceMetadata, Engine};
pub use id::{AsId, IdKind, Identifier};
pub use operation::{FactoryConfig, OperationFactory, TableOperations};
pub use query::RecordQuery;
pub use table::{DataColumn, IdColumn, TableSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    String(String),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Real64(f64),
    Bytes(Vec<u8>),
}

impl DatabaseValue {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(value) => Some(*value as i64),
            Self::Int64(value) => Some(*value),
            _ => None,
        }
    }

    /// Backends without a native boolean report integers, so `0` and `1` are accepted.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int32(0) | Self::Int64(0) => Some(false),
            Self::Int32(1) | Self::Int64(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Real64(_) => "real",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for DatabaseValue {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for DatabaseValue {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<&str> for DatabaseValue {
    fn from(val: &str) -> Self {
        Self::String(val.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(val: &String) -> Self {
        Self::String(val.clone())
    }
}

impl From<String> for DatabaseValue {
    fn from(val: String) -> Self {
        Self::String(val)
    }
}

impl From<i32> for DatabaseValue {
    fn from(val: i32) -> Self {
        Self::Int32(val)
    }
}

impl From<i64> for DatabaseValue {
    fn from(val: i64) -> Self {
        Self::Int64(val)
    }
}

impl From<u32> for DatabaseValue {
    fn from(val: u32) -> Self {
        Self::Int64(i64::from(val))
    }
}

impl From<f64> for DatabaseValue {
    fn from(val: f64) -> Self {
        Self::Real64(val)
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(val: Vec<u8>) -> Self {
        Self::Bytes(val)
    }
}

impl From<&[u8]> for DatabaseValue {
    fn from(val: &[u8]) -> Self {
        Self::Bytes(val.to_vec())
    }
}

impl From<Identifier> for DatabaseValue {
    fn from(val: Identifier) -> Self {
        codec::encode_id(&val)
    }
}

/// Raised when a table layout, type mapping or factory cannot be used as given.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Table name must not be empty")]
    EmptyTableName,
    #[error("Column name must not be empty in table '{table}'")]
    EmptyColumnName { table: String },
    #[error("Column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("Table '{table}' must declare exactly one payload column, found {count}")]
    PayloadColumn { table: String, count: usize },
    #[error("Payload column '{column}' of table '{table}' must be a BLOB column")]
    PayloadType { table: String, column: String },
    #[error("Type mapping '{mapping}' has no SQL name for {data_type:?}")]
    UnmappedType {
        mapping: String,
        data_type: DataType,
    },
    #[error("Type mapping '{mapping}' has an empty SQL name for {data_type:?}")]
    EmptyTypeName {
        mapping: String,
        data_type: DataType,
    },
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to acquire connection: {0}")]
    Connection(#[source] BackendError),
    #[error("Failed to execute '{sql}': {source}")]
    Statement {
        sql: String,
        #[source]
        source: BackendError,
    },
    #[error(transparent)]
    CorruptRecord(#[from] CorruptRecordError),
    #[error(transparent)]
    Protocol(#[from] CursorError),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Failed to serialize record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DatabaseError {
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match &self {
            Self::Connection(_) => true,
            #[cfg(feature = "sqlite-rusqlite")]
            Self::Statement {
                source:
                    BackendError::Rusqlite(::rusqlite::Error::SqliteFailure(
                        ::rusqlite::ffi::Error {
                            code:
                                ::rusqlite::ErrorCode::CannotOpen
                                | ::rusqlite::ErrorCode::DatabaseBusy
                                | ::rusqlite::ErrorCode::DatabaseLocked,
                            ..
                        },
                        _,
                    )),
                ..
            } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, DatabaseValue)>,
}

impl Row {
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<DatabaseValue> {
        self.columns
            .iter()
            .find(|c| c.0 == column_name)
            .map(|c| c.1.clone())
    }

    /// Borrowing variant of [`Row::get`].
    #[must_use]
    pub fn value(&self, column_name: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|c| c.0 == column_name)
            .map(|c| &c.1)
    }
}
