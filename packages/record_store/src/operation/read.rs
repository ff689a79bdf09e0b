use std::fmt;

use super::TableContext;
use crate::{
    DatabaseError, Message,
    cursor::{IdDecoder, PayloadDecoder, RecordCursor, RowDecoder as _},
    id::Identifier,
    query::{self, RecordQuery, Translation},
    sql::{self, SqlStatement},
};

pub struct ReadOne<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> ReadOne<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        let sql = sql::select_by_id_sql(
            context.table_name(),
            &context.table.payload_column().name,
            context.id_column_name(),
            context.placeholder(),
        );

        Self { context, sql }
    }
}

impl<R: Message> ReadOne<R> {
    /// # Errors
    ///
    /// * If the query fails
    /// * If the stored payload does not decode
    pub fn execute(&self, id: &Identifier) -> Result<Option<R>, DatabaseError> {
        let statement = SqlStatement::new(self.sql.clone(), vec![self.context.table.id_column().encode(id)]);
        let rows = self.context.session()?.fetch(&statement)?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let decoder = PayloadDecoder::<R>::new(&self.context.table.payload_column().name);

        Ok(Some(decoder.decode(row)?))
    }
}

impl<R> fmt::Debug for ReadOne<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOne")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}

pub struct ReadByQuery<R> {
    context: TableContext<R>,
}

impl<R> ReadByQuery<R> {
    pub(crate) const fn new(context: TableContext<R>) -> Self {
        Self { context }
    }
}

impl<R: Message> ReadByQuery<R> {
    /// # Errors
    ///
    /// * If the query is invalid for the table
    /// * If the query fails
    pub fn execute(&self, query: &RecordQuery) -> Result<RecordCursor<R>, DatabaseError> {
        let table = &self.context.table;
        let decoder = Box::new(PayloadDecoder::<R>::new(&table.payload_column().name));

        match query::translate(query, table, self.context.placeholder())? {
            Translation::NoRows => Ok(RecordCursor::empty(table.name(), decoder)),
            Translation::Select(statement) => {
                let rows = self.context.session()?.open_rows(&statement)?;

                Ok(RecordCursor::new(
                    table.name(),
                    rows,
                    decoder,
                    Some(self.context.observer.clone()),
                ))
            }
        }
    }
}

impl<R> fmt::Debug for ReadByQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadByQuery")
            .field("context", &self.context)
            .finish()
    }
}

/// Reads the records of a set of ids through the query path.
pub struct ReadMany<R> {
    query: ReadByQuery<R>,
}

impl<R> ReadMany<R> {
    pub(crate) const fn new(context: TableContext<R>) -> Self {
        Self {
            query: ReadByQuery::new(context),
        }
    }
}

impl<R: Message> ReadMany<R> {
    /// # Errors
    ///
    /// * If the query fails
    pub fn execute(&self, ids: &[Identifier]) -> Result<RecordCursor<R>, DatabaseError> {
        self.query.execute(&RecordQuery::by_ids(ids.to_vec()))
    }
}

impl<R> fmt::Debug for ReadMany<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadMany")
            .field("context", &self.query.context)
            .finish()
    }
}

pub struct ReadIndex<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> ReadIndex<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        let sql = format!(
            "SELECT {} FROM {}",
            context.id_column_name(),
            context.table_name()
        );

        Self { context, sql }
    }

    /// # Errors
    ///
    /// * If the query fails
    pub fn execute(&self) -> Result<RecordCursor<Identifier>, DatabaseError> {
        let id_column = self.context.table.id_column();
        let rows = self
            .context
            .session()?
            .open_rows(&SqlStatement::new(self.sql.clone(), vec![]))?;

        Ok(RecordCursor::new(
            self.context.table_name(),
            rows,
            Box::new(IdDecoder::new(&id_column.name, id_column.kind)),
            Some(self.context.observer.clone()),
        ))
    }
}

impl<R> fmt::Debug for ReadIndex<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadIndex")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}

/// Existence probe for a single id.
pub struct Contains<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> Contains<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        let sql = sql::exists_sql(
            context.table_name(),
            context.id_column_name(),
            context.placeholder(),
        );

        Self { context, sql }
    }

    /// # Errors
    ///
    /// * If the query fails
    pub fn execute(&self, id: &Identifier) -> Result<bool, DatabaseError> {
        let statement = SqlStatement::new(self.sql.clone(), vec![self.context.table.id_column().encode(id)]);

        Ok(!self.context.session()?.fetch(&statement)?.is_empty())
    }
}

impl<R> fmt::Debug for Contains<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contains")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}
