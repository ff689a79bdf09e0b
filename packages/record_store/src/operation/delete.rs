use std::fmt;

use super::TableContext;
use crate::{DatabaseError, id::Identifier, sql};

pub struct DeleteOne<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> DeleteOne<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        let sql = sql::delete_by_id_sql(
            context.table_name(),
            context.id_column_name(),
            context.placeholder(),
        );

        Self { context, sql }
    }

    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn execute(&self, id: &Identifier) -> Result<bool, DatabaseError> {
        let affected = self
            .context
            .session()?
            .execute(&self.sql, &[self.context.table.id_column().encode(id)])?;

        Ok(affected != 0)
    }
}

impl<R> fmt::Debug for DeleteOne<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteOne")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}

pub struct DeleteMany<R> {
    context: TableContext<R>,
}

impl<R> DeleteMany<R> {
    pub(crate) const fn new(context: TableContext<R>) -> Self {
        Self { context }
    }

    /// Does nothing for an empty `ids`.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn execute(&self, ids: &[Identifier]) -> Result<(), DatabaseError> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = sql::delete_in_sql(
            self.context.table_name(),
            self.context.id_column_name(),
            ids.len(),
            self.context.placeholder(),
        );
        let id_column = self.context.table.id_column();
        let params = ids.iter().map(|id| id_column.encode(id)).collect::<Vec<_>>();

        self.context.session()?.execute(&sql, &params)?;

        Ok(())
    }
}

impl<R> fmt::Debug for DeleteMany<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteMany")
            .field("context", &self.context)
            .finish()
    }
}

pub struct DeleteAll<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> DeleteAll<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        let sql = sql::delete_all_sql(context.table_name());

        Self { context, sql }
    }

    /// Returns the number of removed rows.
    ///
    /// # Errors
    ///
    /// * If the statement fails
    pub fn execute(&self) -> Result<usize, DatabaseError> {
        self.context.session()?.execute(&self.sql, &[])
    }
}

impl<R> fmt::Debug for DeleteAll<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteAll")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}
