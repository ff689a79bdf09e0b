//! `SQLite` data source backed by `rusqlite`.
//!
//! Every [`DataSource::acquire`] opens a fresh connection to the same database. For an
//! in-memory database the connections share one cache through a `file:` URI, and the
//! data source keeps one extra connection open so the database outlives the
//! connections handed to operations.
//!
//! # Row sources
//!
//! `rusqlite` ties a result set to the statement it came from, so a query reads all of
//! its rows before the connection is handed to the cursor. Records are still decoded one
//! at a time as the cursor advances.
//!
//! # Batches
//!
//! [`Connection::execute_batch`] runs inside a savepoint, so a failing parameter set
//! leaves none of the batch applied, with or without an enclosing transaction.

use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rusqlite::{Rows, Statement, types::Value};

use crate::{
    DatabaseError, DatabaseValue, Row,
    connection::{BackendError, BufferedRows, Connection, DataSource, RowSource},
    engine::DataSourceMetadata,
};

pub const SQLITE_PRODUCT_NAME: &str = "SQLite";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(10);

const BATCH_SAVEPOINT: &str = "record_store_batch";

#[derive(Debug)]
pub struct RusqliteDataSource {
    location: PathBuf,
    product_name: String,
    busy_timeout: Duration,
    keep_alive: Option<Mutex<rusqlite::Connection>>,
}

impl RusqliteDataSource {
    /// Opens, creating it if needed, the database file at `path`.
    ///
    /// # Errors
    ///
    /// * If the database file cannot be opened
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let data_source = Self {
            location: path.to_path_buf(),
            product_name: SQLITE_PRODUCT_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            keep_alive: None,
        };

        data_source.connect().map_err(connection_error)?;

        Ok(data_source)
    }

    /// Creates a new, empty in-memory database.
    ///
    /// # Errors
    ///
    /// * If the database connection fails to open in memory
    pub fn in_memory() -> Result<Self, DatabaseError> {
        static ID: AtomicU64 = AtomicU64::new(0);

        let id = ID.fetch_add(1, Ordering::Relaxed);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |x| x.as_nanos());
        let db_url =
            format!("file:record_store_memdb_{id}_{timestamp}:?mode=memory&cache=shared&uri=true");

        let mut data_source = Self {
            location: PathBuf::from(db_url),
            product_name: SQLITE_PRODUCT_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            keep_alive: None,
        };

        let anchor = data_source.connect().map_err(connection_error)?;
        data_source.keep_alive = Some(Mutex::new(anchor));

        Ok(data_source)
    }

    /// Reports `product_name` instead of `SQLite` in [`DataSource::metadata`].
    #[must_use]
    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = product_name.into();
        self
    }

    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn connect(&self) -> Result<rusqlite::Connection, rusqlite::Error> {
        let connection = rusqlite::Connection::open(&self.location)?;
        connection.busy_timeout(self.busy_timeout)?;
        Ok(connection)
    }
}

impl DataSource for RusqliteDataSource {
    fn acquire(&self, auto_commit: bool) -> Result<Box<dyn Connection>, DatabaseError> {
        let connection = self.connect().map_err(connection_error)?;

        if !auto_commit {
            connection.execute_batch("BEGIN").map_err(connection_error)?;
        }

        Ok(Box::new(RusqliteConnection {
            connection,
            in_transaction: !auto_commit,
        }))
    }

    fn metadata(&self) -> Result<DataSourceMetadata, DatabaseError> {
        let version = u32::try_from(rusqlite::version_number()).unwrap_or(0);

        Ok(DataSourceMetadata {
            product_name: self.product_name.clone(),
            major_version: version / 1_000_000,
            minor_version: (version / 1000) % 1000,
        })
    }
}

fn connection_error(error: rusqlite::Error) -> DatabaseError {
    DatabaseError::Connection(error.into())
}

#[derive(Debug)]
pub struct RusqliteConnection {
    connection: rusqlite::Connection,
    in_transaction: bool,
}

impl Connection for RusqliteConnection {
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<usize, BackendError> {
        let mut statement = self.connection.prepare_cached(sql)?;
        bind_values(&mut statement, params)?;
        Ok(statement.raw_execute()?)
    }

    fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DatabaseValue>],
    ) -> Result<Vec<usize>, BackendError> {
        self.connection
            .execute_batch(&format!("SAVEPOINT {BATCH_SAVEPOINT}"))?;

        match run_batch(&self.connection, sql, param_sets) {
            Ok(counts) => {
                self.connection
                    .execute_batch(&format!("RELEASE {BATCH_SAVEPOINT}"))?;
                Ok(counts)
            }
            Err(e) => {
                if let Err(rollback) = self.connection.execute_batch(&format!(
                    "ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT}"
                )) {
                    log::error!("Failed to roll back batch '{sql}': {rollback:?}");
                }
                Err(e.into())
            }
        }
    }

    fn fetch(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Vec<Row>, BackendError> {
        let mut statement = self.connection.prepare_cached(sql)?;
        let column_names = statement
            .column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect::<Vec<_>>();

        bind_values(&mut statement, params)?;

        Ok(to_rows(&column_names, statement.raw_query())?)
    }

    fn open_rows(
        mut self: Box<Self>,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Box<dyn RowSource>, BackendError> {
        let rows = self.fetch(sql, params)?;
        let connection: Box<dyn Connection> = self;

        Ok(Box::new(BufferedRows::new(rows, Some(connection))))
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        if self.in_transaction {
            self.connection.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        if self.in_transaction {
            self.connection.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl Drop for RusqliteConnection {
    fn drop(&mut self) {
        if self.in_transaction {
            log::debug!("Rolling back uncommitted transaction");
            if let Err(e) = self.connection.execute_batch("ROLLBACK") {
                log::warn!("Failed to roll back transaction: {e:?}");
            }
        }
    }
}

fn run_batch(
    connection: &rusqlite::Connection,
    sql: &str,
    param_sets: &[Vec<DatabaseValue>],
) -> Result<Vec<usize>, rusqlite::Error> {
    let mut statement = connection.prepare_cached(sql)?;
    let mut counts = Vec::with_capacity(param_sets.len());

    for params in param_sets {
        bind_values(&mut statement, params)?;
        counts.push(statement.raw_execute()?);
    }

    Ok(counts)
}

fn bind_values(statement: &mut Statement<'_>, values: &[DatabaseValue]) -> Result<(), rusqlite::Error> {
    for (i, value) in values.iter().enumerate() {
        let index = i + 1;
        match value {
            DatabaseValue::Null => statement.raw_bind_parameter(index, rusqlite::types::Null)?,
            DatabaseValue::String(value) => statement.raw_bind_parameter(index, value)?,
            DatabaseValue::Bool(value) => statement.raw_bind_parameter(index, i32::from(*value))?,
            DatabaseValue::Int32(value) => statement.raw_bind_parameter(index, i64::from(*value))?,
            DatabaseValue::Int64(value) => statement.raw_bind_parameter(index, *value)?,
            DatabaseValue::Real64(value) => statement.raw_bind_parameter(index, *value)?,
            DatabaseValue::Bytes(value) => statement.raw_bind_parameter(index, value)?,
        }
    }

    Ok(())
}

impl From<Value> for DatabaseValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(value) => Self::Int64(value),
            Value::Real(value) => Self::Real64(value),
            Value::Text(value) => Self::String(value),
            Value::Blob(value) => Self::Bytes(value),
        }
    }
}

fn from_row(column_names: &[String], row: &rusqlite::Row<'_>) -> Result<Row, rusqlite::Error> {
    let mut columns = vec![];

    for (index, column) in column_names.iter().enumerate() {
        columns.push((column.clone(), row.get::<_, Value>(index)?.into()));
    }

    Ok(Row { columns })
}

fn to_rows(column_names: &[String], mut rows: Rows<'_>) -> Result<Vec<Row>, rusqlite::Error> {
    let mut results = vec![];

    while let Some(row) = rows.next()? {
        results.push(from_row(column_names, row)?);
    }

    log::trace!(
        "Got {} row{}",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn create_items(connection: &mut dyn Connection) {
        connection
            .execute(
                "CREATE TABLE items (id INTEGER NOT NULL, name TEXT, data BLOB, PRIMARY KEY (id));",
                &[],
            )
            .unwrap();
    }

    #[test_log::test]
    fn in_memory_sources_share_one_database() {
        let data_source = RusqliteDataSource::in_memory().unwrap();

        let mut first = data_source.acquire(true).unwrap();
        create_items(first.as_mut());
        drop(first);

        let mut second = data_source.acquire(true).unwrap();
        second
            .execute(
                "INSERT INTO items (id, name) VALUES (?, ?)",
                &[DatabaseValue::Int64(1), DatabaseValue::String("a".into())],
            )
            .unwrap();

        let rows = second.fetch("SELECT name FROM items", &[]).unwrap();

        assert_eq!(
            rows,
            vec![Row {
                columns: vec![("name".to_string(), DatabaseValue::String("a".into()))],
            }]
        );
    }

    #[test_log::test]
    fn values_round_trip_through_sqlite() {
        let data_source = RusqliteDataSource::in_memory().unwrap();
        let mut connection = data_source.acquire(true).unwrap();
        create_items(connection.as_mut());

        connection
            .execute(
                "INSERT INTO items (id, name, data) VALUES (?, ?, ?)",
                &[
                    DatabaseValue::Int32(7),
                    DatabaseValue::Null,
                    DatabaseValue::Bytes(vec![1, 2, 3]),
                ],
            )
            .unwrap();

        let rows = connection
            .fetch("SELECT id, name, data FROM items WHERE id = ?", &[DatabaseValue::Int64(7)])
            .unwrap();

        assert_eq!(
            rows[0].columns,
            vec![
                ("id".to_string(), DatabaseValue::Int64(7)),
                ("name".to_string(), DatabaseValue::Null),
                ("data".to_string(), DatabaseValue::Bytes(vec![1, 2, 3])),
            ]
        );
    }

    #[test_log::test]
    fn failing_batch_applies_no_parameter_set() {
        let data_source = RusqliteDataSource::in_memory().unwrap();
        let mut connection = data_source.acquire(true).unwrap();
        create_items(connection.as_mut());

        let result = connection.execute_batch(
            "INSERT INTO items (id, name) VALUES (?, ?)",
            &[
                vec![DatabaseValue::Int64(1), DatabaseValue::String("a".into())],
                vec![DatabaseValue::Int64(1), DatabaseValue::String("duplicate".into())],
            ],
        );

        assert!(result.is_err());
        assert!(connection.fetch("SELECT id FROM items", &[]).unwrap().is_empty());
    }

    #[test_log::test]
    fn batch_rebinds_null_between_parameter_sets() {
        let data_source = RusqliteDataSource::in_memory().unwrap();
        let mut connection = data_source.acquire(true).unwrap();
        create_items(connection.as_mut());

        let counts = connection
            .execute_batch(
                "INSERT INTO items (id, name) VALUES (?, ?)",
                &[
                    vec![DatabaseValue::Int64(1), DatabaseValue::String("a".into())],
                    vec![DatabaseValue::Int64(2), DatabaseValue::Null],
                ],
            )
            .unwrap();

        assert_eq!(counts, vec![1, 1]);
        assert_eq!(
            connection
                .fetch("SELECT name FROM items WHERE id = ?", &[DatabaseValue::Int64(2)])
                .unwrap()[0]
                .get("name"),
            Some(DatabaseValue::Null)
        );
    }

    #[test_log::test]
    fn dropping_an_uncommitted_connection_discards_its_writes() {
        let data_source = RusqliteDataSource::in_memory().unwrap();
        create_items(data_source.acquire(true).unwrap().as_mut());

        let mut connection = data_source.acquire(false).unwrap();
        connection
            .execute("INSERT INTO items (id) VALUES (?)", &[DatabaseValue::Int64(1)])
            .unwrap();
        drop(connection);

        let mut reader = data_source.acquire(true).unwrap();
        assert!(reader.fetch("SELECT id FROM items", &[]).unwrap().is_empty());
    }

    #[test_log::test]
    fn metadata_reports_sqlite_unless_overridden() {
        let data_source = RusqliteDataSource::in_memory().unwrap();
        let metadata = data_source.metadata().unwrap();

        assert_eq!(metadata.product_name, "SQLite");
        assert_eq!(metadata.major_version, 3);

        let renamed = data_source.with_product_name("PostgreSQL");
        assert_eq!(renamed.metadata().unwrap().product_name, "PostgreSQL");
    }

    #[test_log::test]
    fn opening_a_file_in_a_missing_directory_is_a_connection_error() {
        let result = RusqliteDataSource::open(Path::new("/nonexistent-dir/record_store/db.sqlite"));

        assert!(matches!(result, Err(DatabaseError::Connection(_))));
    }
}
