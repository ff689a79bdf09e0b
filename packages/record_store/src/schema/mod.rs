//! Table definitions and `CREATE TABLE` synthesis.
//!
//! Column types are expressed as [`DataType`] values and rendered through a
//! [`TypeMapping`](mapping::TypeMapping), which gives each type its engine-specific SQL
//! name.
//!
//! ```rust
//! use record_store::schema::{create_table, mapping::TypeMapping, Column, DataType};
//!
//! let sql = create_table("users")
//!     .if_not_exists(true)
//!     .column(Column {
//!         name: "id".to_string(),
//!         nullable: false,
//!         data_type: DataType::BigInt,
//!         default: None,
//!     })
//!     .column(Column {
//!         name: "bytes".to_string(),
//!         nullable: true,
//!         data_type: DataType::Blob,
//!         default: None,
//!     })
//!     .primary_key("id")
//!     .to_sql(&TypeMapping::mysql())
//!     .unwrap();
//!
//! assert_eq!(
//!     sql,
//!     "CREATE TABLE IF NOT EXISTS users (id BIGINT NOT NULL, bytes BLOB, PRIMARY KEY (id));"
//! );
//! ```
//!
//! # Lifecycle columns
//!
//! Columns named [`ARCHIVED_COLUMN`], [`DELETED_COLUMN`] or [`VERSION_COLUMN`] are
//! always declared `DEFAULT <value> NOT NULL` with their well-known default, whatever
//! the column itself declares. Writers that never set them still produce valid rows.

pub mod mapping;

use std::fmt::Write as _;

use mapping::{BytesLiteral, TypeMapping};

use crate::{ConfigurationError, DatabaseValue};

pub const ARCHIVED_COLUMN: &str = "archived";
pub const DELETED_COLUMN: &str = "deleted";
pub const VERSION_COLUMN: &str = "version";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    BigInt,
    Bool,
    VarChar(u16),
    Text,
    Blob,
    /// A type outside the built-in set; the active [`TypeMapping`] must name it.
    Custom(String),
}

/// The default injected for a lifecycle column, if `name` is one.
#[must_use]
pub fn lifecycle_default(name: &str) -> Option<DatabaseValue> {
    match name {
        ARCHIVED_COLUMN | DELETED_COLUMN => Some(DatabaseValue::Bool(false)),
        VERSION_COLUMN => Some(DatabaseValue::Int32(0)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub nullable: bool,
    pub data_type: DataType,
    pub default: Option<DatabaseValue>,
}

pub struct CreateTableStatement<'a> {
    pub table_name: &'a str,
    pub if_not_exists: bool,
    pub columns: Vec<Column>,
    pub primary_key: Option<&'a str>,
}

#[must_use]
pub const fn create_table(table_name: &str) -> CreateTableStatement<'_> {
    CreateTableStatement {
        table_name,
        if_not_exists: false,
        columns: vec![],
        primary_key: None,
    }
}

impl<'a> CreateTableStatement<'a> {
    #[must_use]
    pub const fn if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    #[must_use]
    pub const fn primary_key(mut self, primary_key: &'a str) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Renders the statement using the SQL type names of `mapping`.
    ///
    /// # Errors
    ///
    /// * If `mapping` has no SQL name for one of the column types
    pub fn to_sql(&self, mapping: &TypeMapping) -> Result<String, ConfigurationError> {
        let mut query = "CREATE TABLE ".to_string();

        if self.if_not_exists {
            query.push_str("IF NOT EXISTS ");
        }

        query.push_str(self.table_name);
        query.push_str(" (");

        let mut first = true;

        for column in &self.columns {
            if first {
                first = false;
            } else {
                query.push_str(", ");
            }

            query.push_str(&column.name);
            query.push(' ');
            query.push_str(&mapping.type_name(&column.data_type)?);

            if let Some(default) = lifecycle_default(&column.name) {
                query.push_str(" DEFAULT ");
                push_literal(&mut query, &default, mapping.bytes_literal());
                query.push_str(" NOT NULL");
                continue;
            }

            if let Some(default) = &column.default {
                query.push_str(" DEFAULT ");
                push_literal(&mut query, default, mapping.bytes_literal());
            }

            if !column.nullable {
                query.push_str(" NOT NULL");
            }
        }

        if let Some(primary_key) = self.primary_key {
            query.push_str(", PRIMARY KEY (");
            query.push_str(primary_key);
            query.push(')');
        }

        query.push_str(");");

        Ok(query)
    }
}

fn push_literal(query: &mut String, value: &DatabaseValue, bytes_literal: BytesLiteral) {
    match value {
        DatabaseValue::Null => query.push_str("NULL"),
        DatabaseValue::String(x) => {
            query.push('\'');
            query.push_str(&x.replace('\'', "''"));
            query.push('\'');
        }
        DatabaseValue::Bool(x) => query.push_str(if *x { "TRUE" } else { "FALSE" }),
        DatabaseValue::Int32(x) => query.push_str(&x.to_string()),
        DatabaseValue::Int64(x) => query.push_str(&x.to_string()),
        DatabaseValue::Real64(x) => query.push_str(&x.to_string()),
        DatabaseValue::Bytes(x) => {
            query.push_str(match bytes_literal {
                BytesLiteral::Hex => "X'",
                BytesLiteral::Escaped => "'\\x",
            });
            for byte in x {
                let _ = write!(query, "{byte:02X}");
            }
            query.push('\'');
        }
    }
}
