//! SQL text rendering for the statements issued by the operations.
//!
//! Every value travels as a bound parameter. Table and column names come from a
//! validated [`TableSpec`](crate::table::TableSpec) and are rendered verbatim.

use crate::{DatabaseValue, engine::UpsertDialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`
    QuestionMark,
    /// `$1`, `$2`, ...
    Numbered,
}

/// A statement together with the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl SqlStatement {
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<DatabaseValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Hands out placeholders in parameter order.
#[derive(Debug, Clone)]
pub struct Params {
    style: Placeholder,
    count: usize,
}

impl Params {
    #[must_use]
    pub const fn new(style: Placeholder) -> Self {
        Self { style, count: 0 }
    }

    pub fn placeholder(&mut self) -> String {
        self.count += 1;
        match self.style {
            Placeholder::QuestionMark => "?".to_string(),
            Placeholder::Numbered => format!("${}", self.count),
        }
    }

    pub fn list(&mut self, count: usize) -> String {
        (0..count).map(|_| self.placeholder()).collect::<Vec<_>>().join(", ")
    }
}

pub(crate) fn build_where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn build_set_clause(columns: &[&str], params: &mut Params) -> String {
    format!(
        "SET {}",
        columns
            .iter()
            .map(|name| format!("{name} = {}", params.placeholder()))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn build_values_clause(count: usize, params: &mut Params) -> String {
    format!("VALUES ({})", params.list(count))
}

fn build_conflict_clause(id_column: &str, columns: &[&str], dialect: UpsertDialect) -> String {
    match dialect {
        UpsertDialect::OnDuplicateKey => format!(
            "ON DUPLICATE KEY UPDATE {}",
            columns
                .iter()
                .map(|name| format!("{name} = VALUES({name})"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        UpsertDialect::OnConflict => format!(
            "ON CONFLICT ({id_column}) DO UPDATE SET {}",
            columns
                .iter()
                .map(|name| format!("{name} = excluded.{name}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// `SELECT 1 FROM <table> WHERE <id> = ?`
#[must_use]
pub fn exists_sql(table: &str, id_column: &str, style: Placeholder) -> String {
    let mut params = Params::new(style);
    format!("SELECT 1 FROM {table} WHERE {id_column} = {}", params.placeholder())
}

/// `SELECT <column> FROM <table> WHERE <id> = ?`
#[must_use]
pub fn select_by_id_sql(table: &str, column: &str, id_column: &str, style: Placeholder) -> String {
    let mut params = Params::new(style);
    format!(
        "SELECT {column} FROM {table} WHERE {id_column} = {}",
        params.placeholder()
    )
}

/// `SELECT <column> FROM <table> WHERE <id> IN (?, ...)`
#[must_use]
pub fn select_in_sql(
    table: &str,
    column: &str,
    id_column: &str,
    count: usize,
    style: Placeholder,
) -> String {
    let mut params = Params::new(style);
    format!(
        "SELECT {column} FROM {table} WHERE {id_column} IN ({})",
        params.list(count)
    )
}

/// `INSERT INTO <table> (<columns>) VALUES (?, ...)`
#[must_use]
pub fn insert_sql(table: &str, columns: &[&str], style: Placeholder) -> String {
    let mut params = Params::new(style);
    format!(
        "INSERT INTO {table} ({}) {}",
        columns.join(", "),
        build_values_clause(columns.len(), &mut params)
    )
}

/// `UPDATE <table> SET <c> = ?, ... WHERE <id> = ?`
///
/// The id is bound after the data columns.
#[must_use]
pub fn update_sql(table: &str, id_column: &str, columns: &[&str], style: Placeholder) -> String {
    let mut params = Params::new(style);
    let set_clause = build_set_clause(columns, &mut params);
    format!(
        "UPDATE {table} {set_clause} WHERE {id_column} = {}",
        params.placeholder()
    )
}

/// `INSERT INTO <table> (<id>, <columns>) VALUES (...) <conflict clause>`
#[must_use]
pub fn upsert_sql(
    table: &str,
    id_column: &str,
    columns: &[&str],
    dialect: UpsertDialect,
    style: Placeholder,
) -> String {
    let all_columns = std::iter::once(id_column)
        .chain(columns.iter().copied())
        .collect::<Vec<_>>();

    format!(
        "{} {}",
        insert_sql(table, &all_columns, style),
        build_conflict_clause(id_column, columns, dialect)
    )
}

/// `DELETE FROM <table> WHERE <id> = ?`
#[must_use]
pub fn delete_by_id_sql(table: &str, id_column: &str, style: Placeholder) -> String {
    let mut params = Params::new(style);
    format!("DELETE FROM {table} WHERE {id_column} = {}", params.placeholder())
}

/// `DELETE FROM <table> WHERE <id> IN (?, ...)`
#[must_use]
pub fn delete_in_sql(table: &str, id_column: &str, count: usize, style: Placeholder) -> String {
    let mut params = Params::new(style);
    format!(
        "DELETE FROM {table} WHERE {id_column} IN ({})",
        params.list(count)
    )
}

#[must_use]
pub fn delete_all_sql(table: &str) -> String {
    format!("DELETE FROM {table}")
}
