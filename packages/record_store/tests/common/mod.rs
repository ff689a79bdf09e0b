#![allow(dead_code)]

pub mod operation_tests;

use std::sync::Arc;

use record_store::{
    AsId, DataColumn, DataSource, Engine, FactoryConfig, IdColumn, IdKind, Identifier,
    OperationFactory, TableSpec,
    observer::{Observer, RecordingObserver},
    rusqlite::RusqliteDataSource,
    schema::DataType,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: String,
    pub count: i32,
}

impl AsId for Counter {
    fn as_id(&self) -> Identifier {
        Identifier::from(self.id.as_str())
    }
}

impl Counter {
    pub fn new(id: &str, count: i32) -> Self {
        Self {
            id: id.to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub col_a: i32,
    pub col_b: Option<String>,
}

impl Reading {
    pub const fn new(id: i64, col_a: i32) -> Self {
        Self {
            id,
            col_a,
            col_b: None,
        }
    }
}

pub fn counter_table() -> Arc<TableSpec<Counter>> {
    Arc::new(
        TableSpec::new(
            "counters",
            IdColumn::of("id", IdKind::String),
            vec![
                DataColumn::value("count", DataType::Int, |x: &Counter| x.count.into()),
                DataColumn::payload("bytes"),
            ],
        )
        .unwrap(),
    )
}

pub fn reading_table() -> Arc<TableSpec<Reading>> {
    Arc::new(
        TableSpec::new(
            "readings",
            IdColumn::new("id", IdKind::Int64, |x: &Reading| Identifier::from(x.id)),
            vec![
                DataColumn::value("col_a", DataType::Int, |x: &Reading| x.col_a.into()),
                DataColumn::value("col_b", DataType::VarChar(32), |x: &Reading| {
                    x.col_b.as_deref().into()
                }),
                DataColumn::payload("bytes"),
            ],
        )
        .unwrap(),
    )
}

pub fn ids(values: &[&str]) -> Vec<Identifier> {
    values.iter().copied().map(Identifier::from).collect()
}

/// A fresh in-memory database together with a factory that records every statement.
pub fn recording_factory(
    engine: Option<Engine>,
) -> (Arc<RusqliteDataSource>, OperationFactory, Arc<RecordingObserver>) {
    let data_source = Arc::new(RusqliteDataSource::in_memory().unwrap());
    let observer = Arc::new(RecordingObserver::new());

    let factory = OperationFactory::with_config(
        data_source.clone() as Arc<dyn DataSource>,
        FactoryConfig {
            engine,
            observer: Some(observer.clone() as Arc<dyn Observer>),
            ..Default::default()
        },
    )
    .unwrap();

    (data_source, factory, observer)
}
