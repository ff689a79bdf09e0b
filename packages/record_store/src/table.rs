//! Describes how a record kind maps onto a table.
//!
//! Columns are plain structs built directly or through the small constructors below.
//! A [`TableSpec`] can only be obtained through [`TableSpec::new`], which validates
//! the layout, so every operation can rely on a non-empty table name, unique column
//! names and exactly one payload column.
//!
//! ```rust
//! use record_store::{
//!     DataColumn, IdColumn, IdKind, Identifier, TableSpec, schema::DataType,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Counter {
//!     id: String,
//!     count: i32,
//! }
//!
//! let table = TableSpec::new(
//!     "counters",
//!     IdColumn::new("id", IdKind::String, |x: &Counter| {
//!         Identifier::String(x.id.clone())
//!     }),
//!     vec![
//!         DataColumn::value("count", DataType::Int, |x: &Counter| x.count.into()),
//!         DataColumn::payload("bytes"),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(table.payload_column().name, "bytes");
//! ```

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::{
    ConfigurationError, DatabaseError, DatabaseValue, Message, codec,
    id::{AsId, IdKind, Identifier},
    schema::{self, Column, DataType},
};

pub type Extractor<R> = Arc<dyn Fn(&R) -> DatabaseValue + Send + Sync>;
pub type IdExtractor<R> = Arc<dyn Fn(&R) -> Identifier + Send + Sync>;

pub struct IdColumn<R> {
    pub name: String,
    pub kind: IdKind,
    /// Overrides the type implied by `kind`.
    pub data_type: Option<DataType>,
    pub extractor: IdExtractor<R>,
}

impl<R> IdColumn<R> {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: IdKind,
        extractor: impl Fn(&R) -> Identifier + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            data_type: None,
            extractor: Arc::new(extractor),
        }
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
            .clone()
            .unwrap_or_else(|| self.kind.default_data_type())
    }

    /// The record's identifier, normalized to this column's kind.
    pub fn id_of(&self, record: &R) -> Identifier {
        (self.extractor)(record).normalized(self.kind)
    }

    /// Binds a caller-supplied identifier in the form this column stores.
    #[must_use]
    pub fn encode(&self, id: &Identifier) -> DatabaseValue {
        crate::codec::encode_id(&id.clone().normalized(self.kind))
    }
}

impl<R: AsId + 'static> IdColumn<R> {
    /// An id column reading each record's [`AsId::as_id`].
    #[must_use]
    pub fn of(name: impl Into<String>, kind: IdKind) -> Self {
        Self::new(name, kind, R::as_id)
    }
}

impl<R> Clone for IdColumn<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            data_type: self.data_type.clone(),
            extractor: self.extractor.clone(),
        }
    }
}

impl<R> fmt::Debug for IdColumn<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdColumn")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// Where a data column takes its value from when a record is written.
pub enum ValueSource<R> {
    Extract(Extractor<R>),
    /// The serialized record itself.
    Payload,
}

impl<R> Clone for ValueSource<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Extract(extractor) => Self::Extract(extractor.clone()),
            Self::Payload => Self::Payload,
        }
    }
}

impl<R> fmt::Debug for ValueSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract(_) => f.write_str("Extract(..)"),
            Self::Payload => f.write_str("Payload"),
        }
    }
}

pub struct DataColumn<R> {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: Option<DatabaseValue>,
    pub source: ValueSource<R>,
}

impl<R> DataColumn<R> {
    /// A nullable column holding a value extracted from each record.
    #[must_use]
    pub fn value(
        name: impl Into<String>,
        data_type: DataType,
        extractor: impl Fn(&R) -> DatabaseValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            source: ValueSource::Extract(Arc::new(extractor)),
        }
    }

    /// The non-null `BLOB` column holding the serialized record.
    #[must_use]
    pub fn payload(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Blob,
            nullable: false,
            default: None,
            source: ValueSource::Payload,
        }
    }

    #[must_use]
    pub const fn is_payload(&self) -> bool {
        matches!(self.source, ValueSource::Payload)
    }
}

impl<R> Clone for DataColumn<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            nullable: self.nullable,
            default: self.default.clone(),
            source: self.source.clone(),
        }
    }
}

impl<R> fmt::Debug for DataColumn<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataColumn")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("source", &self.source)
            .finish()
    }
}

/// A column of a [`TableSpec`] looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Id { kind: IdKind },
    Data { data_type: &'a DataType },
}

pub struct TableSpec<R> {
    name: String,
    id_column: IdColumn<R>,
    data_columns: Vec<DataColumn<R>>,
    payload_index: usize,
}

impl<R> TableSpec<R> {
    /// # Errors
    ///
    /// * If the table name or any column name is empty
    /// * If two columns share a name, the id column included
    /// * If there is not exactly one payload column, or it is not a `BLOB` column
    pub fn new(
        name: impl Into<String>,
        id_column: IdColumn<R>,
        data_columns: Vec<DataColumn<R>>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTableName);
        }

        let mut seen = BTreeSet::new();

        for column_name in
            std::iter::once(&id_column.name).chain(data_columns.iter().map(|x| &x.name))
        {
            if column_name.trim().is_empty() {
                return Err(ConfigurationError::EmptyColumnName { table: name });
            }
            if !seen.insert(column_name.as_str()) {
                return Err(ConfigurationError::DuplicateColumn {
                    column: column_name.clone(),
                    table: name,
                });
            }
        }

        let payloads = data_columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.is_payload())
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        let &[payload_index] = payloads.as_slice() else {
            return Err(ConfigurationError::PayloadColumn {
                table: name,
                count: payloads.len(),
            });
        };

        if data_columns[payload_index].data_type != DataType::Blob {
            return Err(ConfigurationError::PayloadType {
                column: data_columns[payload_index].name.clone(),
                table: name,
            });
        }

        Ok(Self {
            name,
            id_column,
            data_columns,
            payload_index,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn id_column(&self) -> &IdColumn<R> {
        &self.id_column
    }

    #[must_use]
    pub fn data_columns(&self) -> &[DataColumn<R>] {
        &self.data_columns
    }

    #[must_use]
    pub fn payload_column(&self) -> &DataColumn<R> {
        &self.data_columns[self.payload_index]
    }

    #[must_use]
    pub fn data_column_names(&self) -> Vec<&str> {
        self.data_columns.iter().map(|x| x.name.as_str()).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnRef<'_>> {
        if self.id_column.name == name {
            return Some(ColumnRef::Id {
                kind: self.id_column.kind,
            });
        }

        self.data_columns
            .iter()
            .find(|x| x.name == name)
            .map(|x| ColumnRef::Data {
                data_type: &x.data_type,
            })
    }

    /// Column definitions for `CREATE TABLE`, id column first.
    #[must_use]
    pub fn schema_columns(&self) -> Vec<Column> {
        std::iter::once(Column {
            name: self.id_column.name.clone(),
            nullable: false,
            data_type: self.id_column.data_type(),
            default: None,
        })
        .chain(self.data_columns.iter().map(|x| Column {
            name: x.name.clone(),
            nullable: x.nullable,
            data_type: x.data_type.clone(),
            default: x.default.clone(),
        }))
        .collect()
    }

    #[must_use]
    pub fn create_table_statement(&self) -> schema::CreateTableStatement<'_> {
        schema::create_table(&self.name)
            .if_not_exists(true)
            .columns(self.schema_columns())
            .primary_key(&self.id_column.name)
    }
}

impl<R: Message> TableSpec<R> {
    /// Values of the data columns for `record`, in declared order.
    ///
    /// # Errors
    ///
    /// * If the record fails to serialize
    pub fn values_of(&self, record: &R) -> Result<Vec<DatabaseValue>, DatabaseError> {
        self.data_columns
            .iter()
            .map(|column| match &column.source {
                ValueSource::Extract(extractor) => Ok(extractor(record)),
                ValueSource::Payload => codec::serialize(record).map(DatabaseValue::Bytes),
            })
            .collect()
    }
}

impl<R> fmt::Debug for TableSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSpec")
            .field("name", &self.name)
            .field("id_column", &self.id_column)
            .field("data_columns", &self.data_columns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::schema::mapping::TypeMapping;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: i64,
        title: String,
        archived: bool,
    }

    fn id_column() -> IdColumn<Note> {
        IdColumn::new("id", IdKind::Int64, |x: &Note| Identifier::Int64(x.id))
    }

    fn note_table() -> TableSpec<Note> {
        TableSpec::new(
            "notes",
            id_column(),
            vec![
                DataColumn::value("title", DataType::Text, |x: &Note| x.title.clone().into()),
                DataColumn::value("archived", DataType::Bool, |x: &Note| x.archived.into()),
                DataColumn::payload("bytes"),
            ],
        )
        .unwrap()
    }

    #[test_log::test]
    fn values_follow_declared_column_order() {
        let note = Note {
            id: 4,
            title: "groceries".into(),
            archived: true,
        };

        let values = note_table().values_of(&note).unwrap();

        assert_eq!(
            values,
            vec![
                DatabaseValue::String("groceries".into()),
                DatabaseValue::Bool(true),
                DatabaseValue::Bytes(serde_json::to_vec(&note).unwrap()),
            ]
        );
    }

    #[test_log::test]
    fn create_table_statement_puts_id_first_and_key_last() {
        let table = note_table();
        let sql = table
            .create_table_statement()
            .to_sql(&TypeMapping::mysql())
            .unwrap();

        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS notes (\
             id BIGINT NOT NULL, \
             title TEXT, \
             archived BOOLEAN DEFAULT FALSE NOT NULL, \
             bytes BLOB NOT NULL, \
             PRIMARY KEY (id));"
        );
    }

    #[test_log::test]
    fn rejects_missing_payload_column() {
        let result = TableSpec::new(
            "notes",
            id_column(),
            vec![DataColumn::value("title", DataType::Text, |x: &Note| {
                x.title.clone().into()
            })],
        );

        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::PayloadColumn {
                table: "notes".into(),
                count: 0,
            }
        );
    }

    #[test_log::test]
    fn rejects_column_sharing_the_id_name() {
        let result = TableSpec::new(
            "notes",
            id_column(),
            vec![
                DataColumn::value("id", DataType::BigInt, |x: &Note| x.id.into()),
                DataColumn::payload("bytes"),
            ],
        );

        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::DuplicateColumn {
                table: "notes".into(),
                column: "id".into(),
            }
        );
    }

    #[test_log::test]
    fn rejects_empty_table_name() {
        let result = TableSpec::new("  ", id_column(), vec![DataColumn::payload("bytes")]);

        assert_eq!(result.unwrap_err(), ConfigurationError::EmptyTableName);
    }

    #[test_log::test]
    fn column_lookup_distinguishes_id_and_data_columns() {
        let table = note_table();

        assert_eq!(
            table.column("id"),
            Some(ColumnRef::Id {
                kind: IdKind::Int64
            })
        );
        assert_eq!(
            table.column("title"),
            Some(ColumnRef::Data {
                data_type: &DataType::Text
            })
        );
        assert_eq!(table.column("nope"), None);
    }
}
