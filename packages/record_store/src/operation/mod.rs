//! Table operations and the factory that binds them to a data source.
//!
//! The [`OperationFactory`] inspects its data source once to learn which engine it
//! talks to. [`OperationFactory::for_table`] then renders every statement a table needs
//! up front and returns them as a [`TableOperations`] bundle. The engine decides two
//! things: the type mapping used for `CREATE TABLE`, and whether single writes use a
//! native upsert or probe for the row first.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use record_store::{
//!     DataColumn, IdColumn, IdKind, Identifier, OperationFactory, TableSpec,
//!     rusqlite::RusqliteDataSource, schema::DataType,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Counter {
//!     id: String,
//!     count: i32,
//! }
//!
//! # fn example() -> Result<(), record_store::DatabaseError> {
//! let factory = OperationFactory::new(Arc::new(RusqliteDataSource::in_memory()?))?;
//! let counters = factory.for_table(Arc::new(TableSpec::new(
//!     "counters",
//!     IdColumn::new("id", IdKind::String, |x: &Counter| Identifier::String(x.id.clone())),
//!     vec![
//!         DataColumn::value("count", DataType::Int, |x: &Counter| x.count.into()),
//!         DataColumn::payload("bytes"),
//!     ],
//! )?))?;
//!
//! counters.create()?;
//! counters.write_one(&Counter { id: "a".into(), count: 1 })?;
//! assert!(counters.read_one(&Identifier::from("a"))?.is_some());
//! # Ok(())
//! # }
//! ```

mod create;
mod delete;
mod read;
mod write;

use std::{fmt, sync::Arc};

pub use create::CreateTable;
pub use delete::{DeleteAll, DeleteMany, DeleteOne};
pub use read::{Contains, ReadByQuery, ReadIndex, ReadMany, ReadOne};
pub use write::{WriteMany, WriteOne, WriteStrategy};

use crate::{
    DatabaseError, DatabaseValue, Message, Row,
    connection::{Connection, DataSource, RowSource},
    cursor::RecordCursor,
    engine::Engine,
    id::Identifier,
    observer::{LogObserver, Observer},
    query::RecordQuery,
    schema::mapping::TypeMapping,
    sql::{Placeholder, SqlStatement},
    table::TableSpec,
};

/// Overrides for [`OperationFactory::with_config`]. Unset fields are derived from the
/// data source.
#[derive(Debug, Clone, Default)]
pub struct FactoryConfig {
    /// Skips detection and uses this engine.
    pub engine: Option<Engine>,
    /// Replaces the engine's predefined mapping.
    pub type_mapping: Option<TypeMapping>,
    /// Defaults to [`LogObserver`].
    pub observer: Option<Arc<dyn Observer>>,
}

#[derive(Debug, Clone)]
pub struct OperationFactory {
    data_source: Arc<dyn DataSource>,
    engine: Engine,
    type_mapping: Arc<TypeMapping>,
    observer: Arc<dyn Observer>,
}

impl OperationFactory {
    /// # Errors
    ///
    /// * If the data source fails to report its identity
    pub fn new(data_source: Arc<dyn DataSource>) -> Result<Self, DatabaseError> {
        Self::with_config(data_source, FactoryConfig::default())
    }

    /// # Errors
    ///
    /// * If no engine is configured and the data source fails to report its identity
    pub fn with_config(
        data_source: Arc<dyn DataSource>,
        config: FactoryConfig,
    ) -> Result<Self, DatabaseError> {
        let observer = config
            .observer
            .unwrap_or_else(|| Arc::new(LogObserver) as Arc<dyn Observer>);

        let engine = if let Some(engine) = config.engine {
            engine
        } else {
            let metadata = data_source.metadata()?;
            let engine = Engine::detect(&metadata);
            observer.on_engine(engine, &metadata.product_name);
            engine
        };

        let type_mapping = config
            .type_mapping
            .unwrap_or_else(|| engine.type_mapping());

        Ok(Self {
            data_source,
            engine,
            type_mapping: Arc::new(type_mapping),
            observer,
        })
    }

    #[must_use]
    pub const fn engine(&self) -> Engine {
        self.engine
    }

    #[must_use]
    pub fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    /// # Errors
    ///
    /// * If a column type of `table` is missing from the type mapping
    pub fn for_table<R: Message>(
        &self,
        table: Arc<TableSpec<R>>,
    ) -> Result<TableOperations<R>, DatabaseError> {
        let context = TableContext {
            table,
            data_source: self.data_source.clone(),
            observer: self.observer.clone(),
            engine: self.engine,
        };

        Ok(TableOperations {
            create: CreateTable::new(context.clone(), &self.type_mapping)?,
            write_one: WriteOne::new(context.clone(), WriteStrategy::for_engine(self.engine)),
            write_many: WriteMany::new(context.clone()),
            read_one: ReadOne::new(context.clone()),
            read_many: ReadMany::new(context.clone()),
            read_by_query: ReadByQuery::new(context.clone()),
            read_index: ReadIndex::new(context.clone()),
            contains: Contains::new(context.clone()),
            delete_one: DeleteOne::new(context.clone()),
            delete_many: DeleteMany::new(context.clone()),
            delete_all: DeleteAll::new(context),
        })
    }
}

/// Every operation on one table, bound to one data source.
pub struct TableOperations<R> {
    create: CreateTable<R>,
    write_one: WriteOne<R>,
    write_many: WriteMany<R>,
    read_one: ReadOne<R>,
    read_many: ReadMany<R>,
    read_by_query: ReadByQuery<R>,
    read_index: ReadIndex<R>,
    contains: Contains<R>,
    delete_one: DeleteOne<R>,
    delete_many: DeleteMany<R>,
    delete_all: DeleteAll<R>,
}

impl<R: Message> TableOperations<R> {
    #[must_use]
    pub fn table(&self) -> &TableSpec<R> {
        &self.create.context().table
    }

    #[must_use]
    pub const fn write_strategy(&self) -> WriteStrategy {
        self.write_one.strategy()
    }

    #[must_use]
    pub fn create_table_sql(&self) -> &str {
        self.create.sql()
    }

    /// Creates the table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn create(&self) -> Result<(), DatabaseError> {
        self.create.execute()
    }

    /// Inserts the record, or replaces the stored row with the same id.
    ///
    /// # Errors
    ///
    /// * If the record fails to serialize
    /// * If a statement fails
    pub fn write_one(&self, record: &R) -> Result<(), DatabaseError> {
        self.write_one.execute(record)
    }

    /// Inserts or replaces every record using at most one existence probe, one update
    /// batch and one insert batch. When ids repeat, the last record with that id wins.
    ///
    /// # Errors
    ///
    /// * If a record fails to serialize
    /// * If a statement fails. Batches that already ran stay applied.
    pub fn write_many(&self, records: &[R]) -> Result<(), DatabaseError> {
        self.write_many.execute(records)
    }

    /// # Errors
    ///
    /// * If the query fails
    /// * If the stored payload does not decode
    pub fn read_one(&self, id: &Identifier) -> Result<Option<R>, DatabaseError> {
        self.read_one.execute(id)
    }

    /// Records with the given ids, in no particular order. Ids without a stored record
    /// are skipped.
    ///
    /// # Errors
    ///
    /// * If the query fails
    pub fn read_many(&self, ids: &[Identifier]) -> Result<RecordCursor<R>, DatabaseError> {
        self.read_many.execute(ids)
    }

    /// # Errors
    ///
    /// * If the query is invalid for this table
    /// * If the query fails
    pub fn read_by_query(&self, query: &RecordQuery) -> Result<RecordCursor<R>, DatabaseError> {
        self.read_by_query.execute(query)
    }

    /// Every id stored in the table.
    ///
    /// # Errors
    ///
    /// * If the query fails
    pub fn read_index(&self) -> Result<RecordCursor<Identifier>, DatabaseError> {
        self.read_index.execute()
    }

    /// # Errors
    ///
    /// * If the query fails
    pub fn contains(&self, id: &Identifier) -> Result<bool, DatabaseError> {
        self.contains.execute(id)
    }

    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn delete_one(&self, id: &Identifier) -> Result<bool, DatabaseError> {
        self.delete_one.execute(id)
    }

    /// # Errors
    ///
    /// * If the statement fails
    pub fn delete_many(&self, ids: &[Identifier]) -> Result<(), DatabaseError> {
        self.delete_many.execute(ids)
    }

    /// Returns the number of removed rows.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn delete_all(&self) -> Result<usize, DatabaseError> {
        self.delete_all.execute()
    }
}

impl<R> fmt::Debug for TableOperations<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableOperations")
            .field("context", self.create.context())
            .field("write_strategy", &self.write_one.strategy())
            .finish_non_exhaustive()
    }
}

/// What every operation on a table shares.
pub(crate) struct TableContext<R> {
    pub table: Arc<TableSpec<R>>,
    pub data_source: Arc<dyn DataSource>,
    pub observer: Arc<dyn Observer>,
    pub engine: Engine,
}

impl<R> TableContext<R> {
    pub const fn placeholder(&self) -> Placeholder {
        self.engine.placeholder()
    }

    pub fn session(&self) -> Result<Session<'_>, DatabaseError> {
        Ok(Session {
            connection: self.data_source.acquire(true)?,
            observer: self.observer.as_ref(),
        })
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    pub fn id_column_name(&self) -> &str {
        &self.table.id_column().name
    }
}

impl<R> Clone for TableContext<R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            data_source: self.data_source.clone(),
            observer: self.observer.clone(),
            engine: self.engine,
        }
    }
}

impl<R> fmt::Debug for TableContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableContext")
            .field("table", &self.table.name())
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// One acquired connection. Reports each statement to the observer and attaches the
/// SQL text to driver errors.
pub(crate) struct Session<'a> {
    connection: Box<dyn Connection>,
    observer: &'a dyn Observer,
}

impl Session<'_> {
    pub fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<usize, DatabaseError> {
        self.observer.on_statement(sql, params);
        self.connection
            .execute(sql, params)
            .map_err(|source| statement_error(sql, source))
    }

    pub fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<DatabaseValue>],
    ) -> Result<Vec<usize>, DatabaseError> {
        self.observer.on_batch(sql, param_sets.len());
        self.connection
            .execute_batch(sql, param_sets)
            .map_err(|source| statement_error(sql, source))
    }

    pub fn fetch(&mut self, statement: &SqlStatement) -> Result<Vec<Row>, DatabaseError> {
        self.observer
            .on_statement(&statement.sql, &statement.params);
        self.connection
            .fetch(&statement.sql, &statement.params)
            .map_err(|source| statement_error(&statement.sql, source))
    }

    pub fn open_rows(self, statement: &SqlStatement) -> Result<Box<dyn RowSource>, DatabaseError> {
        self.observer
            .on_statement(&statement.sql, &statement.params);
        self.connection
            .open_rows(&statement.sql, &statement.params)
            .map_err(|source| statement_error(&statement.sql, source))
    }
}

fn statement_error(sql: &str, source: crate::connection::BackendError) -> DatabaseError {
    DatabaseError::Statement {
        sql: sql.to_string(),
        source,
    }
}
