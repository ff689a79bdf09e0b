use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use super::{Session, TableContext};
use crate::{
    DatabaseError, DatabaseValue, Message, codec,
    engine::{Engine, UpsertDialect},
    id::Identifier,
    sql::{self, SqlStatement},
};

/// How a single write finds out whether to insert or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Probe for the id, then `UPDATE` or `INSERT`.
    ProbeThenWrite,
    /// One `INSERT` with the engine's conflict clause.
    Upsert(UpsertDialect),
}

impl WriteStrategy {
    #[must_use]
    pub const fn for_engine(engine: Engine) -> Self {
        match engine.upsert() {
            Some(dialect) => Self::Upsert(dialect),
            None => Self::ProbeThenWrite,
        }
    }
}

/// Rendered `INSERT` and `UPDATE` statements of a table. Parameters bind as
/// `(id, columns...)` for the insert and `(columns..., id)` for the update.
struct WriteStatements {
    insert: String,
    update: String,
}

impl WriteStatements {
    fn new<R>(context: &TableContext<R>) -> Self {
        let table = &context.table;
        let id_column = context.id_column_name();
        let columns = table.data_column_names();
        let all_columns = std::iter::once(id_column)
            .chain(columns.iter().copied())
            .collect::<Vec<_>>();

        Self {
            insert: sql::insert_sql(table.name(), &all_columns, context.placeholder()),
            update: sql::update_sql(table.name(), id_column, &columns, context.placeholder()),
        }
    }
}

fn insert_params(id: DatabaseValue, values: Vec<DatabaseValue>) -> Vec<DatabaseValue> {
    std::iter::once(id).chain(values).collect()
}

fn update_params(id: DatabaseValue, mut values: Vec<DatabaseValue>) -> Vec<DatabaseValue> {
    values.push(id);
    values
}

pub struct WriteOne<R> {
    context: TableContext<R>,
    strategy: WriteStrategy,
    statements: WriteStatements,
    exists: String,
    upsert: Option<String>,
}

impl<R> WriteOne<R> {
    pub(crate) fn new(context: TableContext<R>, strategy: WriteStrategy) -> Self {
        let table_name = context.table_name();
        let id_column = context.id_column_name();

        let upsert = match strategy {
            WriteStrategy::Upsert(dialect) => Some(sql::upsert_sql(
                table_name,
                id_column,
                &context.table.data_column_names(),
                dialect,
                context.placeholder(),
            )),
            WriteStrategy::ProbeThenWrite => None,
        };

        Self {
            statements: WriteStatements::new(&context),
            exists: sql::exists_sql(table_name, id_column, context.placeholder()),
            upsert,
            strategy,
            context,
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> WriteStrategy {
        self.strategy
    }
}

impl<R: Message> WriteOne<R> {
    /// # Errors
    ///
    /// * If the record fails to serialize
    /// * If a statement fails
    pub fn execute(&self, record: &R) -> Result<(), DatabaseError> {
        let table = &self.context.table;
        let id_column = table.id_column();
        let id = codec::encode_id(&id_column.id_of(record));
        let values = table.values_of(record)?;
        let mut session = self.context.session()?;

        if let Some(upsert) = &self.upsert {
            session.execute(upsert, &insert_params(id, values))?;
            return Ok(());
        }

        let probe = SqlStatement::new(self.exists.clone(), vec![id.clone()]);

        if session.fetch(&probe)?.is_empty() {
            session.execute(&self.statements.insert, &insert_params(id, values))?;
        } else {
            session.execute(&self.statements.update, &update_params(id, values))?;
        }

        Ok(())
    }
}

impl<R> fmt::Debug for WriteOne<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOne")
            .field("context", &self.context)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

pub struct WriteMany<R> {
    context: TableContext<R>,
    statements: WriteStatements,
}

impl<R> WriteMany<R> {
    pub(crate) fn new(context: TableContext<R>) -> Self {
        Self {
            statements: WriteStatements::new(&context),
            context,
        }
    }
}

impl<R: Message> WriteMany<R> {
    /// # Errors
    ///
    /// * If a record fails to serialize
    /// * If a statement fails
    pub fn execute(&self, records: &[R]) -> Result<(), DatabaseError> {
        if records.is_empty() {
            return Ok(());
        }

        let table = &self.context.table;
        let id_column = table.id_column();
        let records = latest_by_id(records, |record| id_column.id_of(record));

        let mut session = self.context.session()?;
        let existing = self.existing_ids(&mut session, &records)?;

        let mut updates = vec![];
        let mut inserts = vec![];

        for (id, record) in records {
            let values = table.values_of(record)?;
            let encoded = codec::encode_id(&id);

            if existing.contains(&id) {
                updates.push(update_params(encoded, values));
            } else {
                inserts.push(insert_params(encoded, values));
            }
        }

        log::debug!(
            "Writing {} record(s) to {}: {} update(s), {} insert(s)",
            updates.len() + inserts.len(),
            table.name(),
            updates.len(),
            inserts.len(),
        );

        if !updates.is_empty() {
            session.execute_batch(&self.statements.update, &updates)?;
        }
        if !inserts.is_empty() {
            session.execute_batch(&self.statements.insert, &inserts)?;
        }

        Ok(())
    }

    fn existing_ids(
        &self,
        session: &mut Session<'_>,
        records: &[(Identifier, &R)],
    ) -> Result<HashSet<Identifier>, DatabaseError> {
        let id_column = self.context.table.id_column();
        let probe = SqlStatement::new(
            sql::select_in_sql(
                self.context.table_name(),
                &id_column.name,
                &id_column.name,
                records.len(),
                self.context.placeholder(),
            ),
            records.iter().map(|(id, _)| codec::encode_id(id)).collect(),
        );

        session
            .fetch(&probe)?
            .iter()
            .map(|row| -> Result<Identifier, DatabaseError> {
                let value = row.value(&id_column.name).ok_or_else(|| {
                    codec::CorruptRecordError::MissingColumn(id_column.name.clone())
                })?;
                let id = codec::decode_id(id_column.kind, &id_column.name, value)?;
                Ok(id.normalized(id_column.kind))
            })
            .collect()
    }
}

impl<R> fmt::Debug for WriteMany<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteMany")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Keeps the last record for each id, ordered by where each id first appears.
fn latest_by_id<'a, R>(
    records: &'a [R],
    id_of: impl Fn(&R) -> Identifier,
) -> Vec<(Identifier, &'a R)> {
    let mut positions = HashMap::new();
    let mut latest: Vec<(Identifier, &'a R)> = vec![];

    for record in records {
        let id = id_of(record);
        if let Some(&position) = positions.get(&id) {
            latest[position] = (id, record);
        } else {
            positions.insert(id.clone(), latest.len());
            latest.push((id, record));
        }
    }

    latest
}
