use std::fmt;

use super::TableContext;
use crate::{ConfigurationError, DatabaseError, schema::mapping::TypeMapping};

/// Runs the `CREATE TABLE IF NOT EXISTS` statement of a table.
pub struct CreateTable<R> {
    context: TableContext<R>,
    sql: String,
}

impl<R> CreateTable<R> {
    pub(crate) fn new(
        context: TableContext<R>,
        mapping: &TypeMapping,
    ) -> Result<Self, ConfigurationError> {
        let sql = context.table.create_table_statement().to_sql(mapping)?;

        Ok(Self { context, sql })
    }

    pub(crate) const fn context(&self) -> &TableContext<R> {
        &self.context
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// # Errors
    ///
    /// * If the statement fails
    pub fn execute(&self) -> Result<(), DatabaseError> {
        log::debug!("Creating table {} if missing", self.context.table_name());

        self.context.session()?.execute(&self.sql, &[])?;

        Ok(())
    }
}

impl<R> fmt::Debug for CreateTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateTable")
            .field("context", &self.context)
            .field("sql", &self.sql)
            .finish()
    }
}
