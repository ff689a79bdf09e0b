//! Structured record queries and their translation into parameterized `SELECT`s.
//!
//! A [`RecordQuery`] is a disjunction of filter groups, each group a conjunction of
//! column comparisons, optionally restricted to a set of identifiers, ordered by one
//! column and limited to a number of rows.
//!
//! ```rust
//! use record_store::query::{OrderBy, RecordQuery, where_gt, where_eq};
//!
//! // (priority > 5 AND owner = 'ann') OR (owner = 'bob'), highest priority first
//! let query = RecordQuery {
//!     filters: vec![
//!         vec![where_gt("priority", 5), where_eq("owner", "ann")],
//!         vec![where_eq("owner", "bob")],
//!     ],
//!     order_by: Some(OrderBy::desc("priority")),
//!     limit: Some(10),
//!     ..Default::default()
//! };
//! # let _ = query;
//! ```
//!
//! Every literal is checked against the declared type of its column and bound as a
//! parameter; nothing from a query is spliced into the SQL text apart from column
//! names, which must belong to the table.

use crate::{
    DatabaseError, DatabaseValue,
    id::{IdKind, Identifier},
    schema::DataType,
    sql::{Params, Placeholder, SqlStatement, build_where_clause},
    table::{ColumnRef, TableSpec},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub comparison: Comparison,
    pub value: DatabaseValue,
}

fn filter(column: impl Into<String>, comparison: Comparison, value: DatabaseValue) -> Filter {
    Filter {
        column: column.into(),
        comparison,
        value,
    }
}

/// `column = value`, or `column IS NULL` for a null value.
#[must_use]
pub fn where_eq(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::Equal, value.into())
}

/// `column <> value`, or `column IS NOT NULL` for a null value.
#[must_use]
pub fn where_not_eq(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::NotEqual, value.into())
}

#[must_use]
pub fn where_gt(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::GreaterThan, value.into())
}

#[must_use]
pub fn where_gte(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::GreaterOrEqual, value.into())
}

#[must_use]
pub fn where_lt(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::LessThan, value.into())
}

#[must_use]
pub fn where_lte(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Filter {
    filter(column, Comparison::LessOrEqual, value.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Only records with one of these ids match. An empty list matches nothing.
    pub ids: Option<Vec<Identifier>>,
    /// Groups combined with OR; filters within a group combined with AND. No groups,
    /// or an empty group, matches every record.
    pub filters: Vec<Vec<Filter>>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    #[must_use]
    pub fn by_ids(ids: Vec<Identifier>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Select(SqlStatement),
    /// The query can match no row; nothing needs to run.
    NoRows,
}

/// Translates `query` into a `SELECT` of the payload column of `table`.
///
/// # Errors
///
/// * If the query references a column `table` does not have
/// * If a literal does not fit the declared type of its column
/// * If a null literal is used with an ordering comparison
pub fn translate<R>(
    query: &RecordQuery,
    table: &TableSpec<R>,
    style: Placeholder,
) -> Result<Translation, DatabaseError> {
    translate_select(query, table, &table.payload_column().name, style)
}

/// Like [`translate`], selecting `column` instead of the payload column.
///
/// # Errors
///
/// * See [`translate`]
pub fn translate_select<R>(
    query: &RecordQuery,
    table: &TableSpec<R>,
    column: &str,
    style: Placeholder,
) -> Result<Translation, DatabaseError> {
    let mut params = Params::new(style);
    let mut values = vec![];
    let mut conditions = vec![];

    if let Some(ids) = &query.ids {
        if ids.is_empty() {
            log::trace!("Skipping query on {}: empty id set", table.name());
            return Ok(Translation::NoRows);
        }

        let id_column = table.id_column();

        for id in ids {
            values.push(encode_id_literal(
                id_column.kind,
                &id_column.name,
                &id_column.encode(id),
            )?);
        }

        conditions.push(format!("{} IN ({})", id_column.name, params.list(ids.len())));
    }

    if let Some(groups) = build_filter_groups(&query.filters, table, &mut params, &mut values)? {
        conditions.push(if conditions.is_empty() {
            groups
        } else {
            format!("({groups})")
        });
    }

    let mut sql = format!(
        "SELECT {column} FROM {}{}",
        table.name(),
        build_where_clause(&conditions)
    );

    if let Some(order_by) = &query.order_by {
        if table.column(&order_by.column).is_none() {
            return Err(unknown_column(&order_by.column, table));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by.column);
        sql.push_str(match order_by.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        });
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(Translation::Select(SqlStatement::new(sql, values)))
}

fn build_filter_groups<R>(
    groups: &[Vec<Filter>],
    table: &TableSpec<R>,
    params: &mut Params,
    values: &mut Vec<DatabaseValue>,
) -> Result<Option<String>, DatabaseError> {
    let mut group_params = params.clone();
    let mut group_values = vec![];
    let mut rendered = vec![];

    for group in groups {
        let mut props = vec![];
        for filter in group {
            props.push(build_filter(
                filter,
                table,
                &mut group_params,
                &mut group_values,
            )?);
        }
        rendered.push(format!("({})", props.join(" AND ")));
    }

    // An empty group matches every row, which makes the whole disjunction a no-op.
    if groups.is_empty() || groups.iter().any(Vec::is_empty) {
        return Ok(None);
    }

    *params = group_params;
    values.extend(group_values);

    Ok(Some(rendered.join(" OR ")))
}

fn build_filter<R>(
    filter: &Filter,
    table: &TableSpec<R>,
    params: &mut Params,
    values: &mut Vec<DatabaseValue>,
) -> Result<String, DatabaseError> {
    let column = &filter.column;
    let Some(column_ref) = table.column(column) else {
        return Err(unknown_column(column, table));
    };

    if filter.value.is_null() {
        return match filter.comparison {
            Comparison::Equal => Ok(format!("{column} IS NULL")),
            Comparison::NotEqual => Ok(format!("{column} IS NOT NULL")),
            comparison => Err(DatabaseError::InvalidQuery(format!(
                "Cannot compare column '{column}' {} NULL",
                comparison.as_sql()
            ))),
        };
    }

    let value = match column_ref {
        ColumnRef::Id { kind } => encode_id_literal(kind, column, &filter.value)?,
        ColumnRef::Data { data_type } => encode_data_literal(data_type, column, &filter.value)?,
    };

    values.push(value);

    Ok(format!(
        "{column} {} {}",
        filter.comparison.as_sql(),
        params.placeholder()
    ))
}

fn unknown_column<R>(column: &str, table: &TableSpec<R>) -> DatabaseError {
    DatabaseError::InvalidQuery(format!(
        "Unknown column '{column}' in table '{}'",
        table.name()
    ))
}

fn mismatch(column: &str, expected: &str, value: &DatabaseValue) -> DatabaseError {
    DatabaseError::InvalidQuery(format!(
        "Column '{column}' expects {expected}, got a {} literal",
        value.kind_name()
    ))
}

fn encode_id_literal(
    kind: IdKind,
    column: &str,
    value: &DatabaseValue,
) -> Result<DatabaseValue, DatabaseError> {
    match kind {
        IdKind::Int64 => value
            .as_i64()
            .map(DatabaseValue::Int64)
            .ok_or_else(|| mismatch(column, "an int64 id", value)),
        IdKind::Int32 => value
            .as_i64()
            .and_then(|x| i32::try_from(x).ok())
            .map(DatabaseValue::Int32)
            .ok_or_else(|| mismatch(column, "an int32 id", value)),
        IdKind::String | IdKind::Message => value
            .as_str()
            .map(|x| DatabaseValue::String(x.to_string()))
            .ok_or_else(|| mismatch(column, "a string id", value)),
    }
}

fn encode_data_literal(
    data_type: &DataType,
    column: &str,
    value: &DatabaseValue,
) -> Result<DatabaseValue, DatabaseError> {
    match data_type {
        DataType::Int => value
            .as_i64()
            .and_then(|x| i32::try_from(x).ok())
            .map(DatabaseValue::Int32)
            .ok_or_else(|| mismatch(column, "an int32", value)),
        DataType::BigInt => value
            .as_i64()
            .map(DatabaseValue::Int64)
            .ok_or_else(|| mismatch(column, "an int64", value)),
        DataType::Bool => match value {
            DatabaseValue::Bool(_) => Ok(value.clone()),
            _ => Err(mismatch(column, "a bool", value)),
        },
        DataType::VarChar(_) | DataType::Text => match value {
            DatabaseValue::String(_) => Ok(value.clone()),
            _ => Err(mismatch(column, "a string", value)),
        },
        DataType::Blob => match value {
            DatabaseValue::Bytes(_) => Ok(value.clone()),
            _ => Err(mismatch(column, "bytes", value)),
        },
        DataType::Custom(_) => Ok(value.clone()),
    }
}
