//! Engine-independent checks of the table operations.
//!
//! Each suite implementation picks the engine its factory runs as, so the same checks
//! cover both the native upsert path and the portable probe-then-write path.

use std::{collections::BTreeMap, sync::Arc};

use pretty_assertions::assert_eq;
use record_store::{
    Engine, Identifier, OperationFactory, RecordQuery,
    observer::{ObservedStatement, RecordingObserver},
    query::{OrderBy, where_gt},
    rusqlite::RusqliteDataSource,
};

use super::{Counter, Reading, counter_table, ids, reading_table, recording_factory};

fn counts(counters: Vec<Counter>) -> BTreeMap<String, i32> {
    counters.into_iter().map(|x| (x.id, x.count)).collect()
}

#[allow(unused)]
pub trait OperationTestSuite {
    /// Engine the factory is forced to, or `None` to detect it.
    fn engine(&self) -> Option<Engine>;

    fn setup(&self) -> (Arc<RusqliteDataSource>, OperationFactory, Arc<RecordingObserver>) {
        recording_factory(self.engine())
    }

    fn test_write_then_read(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();

        let counter = Counter::new("a", 1);
        counters.write_one(&counter).unwrap();

        assert_eq!(counters.read_one(&Identifier::from("a")).unwrap(), Some(counter));
        assert_eq!(counters.read_one(&Identifier::from("missing")).unwrap(), None);
    }

    fn test_repeated_writes_keep_the_last_record(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();

        for count in 1..=3 {
            counters.write_one(&Counter::new("a", count)).unwrap();
        }

        let stored = counters.read_many(&ids(&["a"])).unwrap().into_vec().unwrap();

        assert_eq!(stored, vec![Counter::new("a", 3)]);
    }

    fn test_bulk_write_example(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();

        counters.write_one(&Counter::new("a", 1)).unwrap();
        counters.write_one(&Counter::new("b", 2)).unwrap();
        counters
            .write_many(&[Counter::new("a", 9), Counter::new("c", 3)])
            .unwrap();

        let stored = counters
            .read_many(&ids(&["a", "b", "c"]))
            .unwrap()
            .into_vec()
            .unwrap();

        assert_eq!(
            counts(stored),
            BTreeMap::from([
                ("a".to_string(), 9),
                ("b".to_string(), 2),
                ("c".to_string(), 3),
            ])
        );
    }

    fn test_bulk_write_partitions_by_existence(&self) {
        let (_db, factory, observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        counters
            .write_many(&[Counter::new("a", 1), Counter::new("b", 1), Counter::new("c", 1)])
            .unwrap();

        observer.clear();

        counters
            .write_many(&[
                Counter::new("a", 2),
                Counter::new("b", 2),
                Counter::new("d", 2),
                Counter::new("e", 2),
                Counter::new("f", 2),
            ])
            .unwrap();

        let statements = observer.statements();
        assert_eq!(statements.len(), 3, "{statements:?}");

        assert!(matches!(
            &statements[0],
            ObservedStatement::Single { sql, params }
                if sql.starts_with("SELECT id FROM counters WHERE id IN") && params.len() == 5
        ));
        assert!(matches!(
            &statements[1],
            ObservedStatement::Batch { sql, param_sets: 2 } if sql.starts_with("UPDATE counters")
        ));
        assert!(matches!(
            &statements[2],
            ObservedStatement::Batch { sql, param_sets: 3 } if sql.starts_with("INSERT INTO counters")
        ));

        let stored = counters.read_index().unwrap().into_vec().unwrap();
        assert_eq!(stored.len(), 6);
    }

    fn test_bulk_write_of_only_new_records_skips_the_update_batch(&self) {
        let (_db, factory, observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        observer.clear();

        counters
            .write_many(&[Counter::new("a", 1), Counter::new("b", 1)])
            .unwrap();

        let sql = observer
            .statements()
            .iter()
            .map(|x| x.sql().split(' ').next().unwrap_or_default().to_string())
            .collect::<Vec<_>>();

        assert_eq!(sql, vec!["SELECT".to_string(), "INSERT".to_string()]);
    }

    fn test_empty_bulk_write_issues_no_statements(&self) {
        let (_db, factory, observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        observer.clear();

        counters.write_many(&[]).unwrap();

        assert!(observer.statements().is_empty());
    }

    fn test_bulk_write_with_repeated_ids_keeps_the_last(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();

        counters
            .write_many(&[Counter::new("a", 1), Counter::new("b", 1), Counter::new("a", 5)])
            .unwrap();

        assert_eq!(
            counters.read_one(&Identifier::from("a")).unwrap(),
            Some(Counter::new("a", 5))
        );
    }

    fn test_empty_id_set_reads_without_a_query(&self) {
        let (_db, factory, observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        observer.clear();

        let mut cursor = counters.read_many(&[]).unwrap();

        assert!(!cursor.advance().unwrap());
        assert!(observer.statements().is_empty());
    }

    fn test_filtered_query_orders_and_limits(&self) {
        let (_db, factory, observer) = self.setup();
        let readings = factory.for_table(reading_table()).unwrap();
        readings.create().unwrap();
        readings
            .write_many(&[
                Reading::new(1, 1),
                Reading::new(2, 7),
                Reading::new(3, 3),
                Reading::new(4, 9),
                Reading::new(5, 6),
            ])
            .unwrap();
        observer.clear();

        let query = RecordQuery {
            filters: vec![vec![where_gt("col_a", 5)]],
            order_by: Some(OrderBy::desc("col_a")),
            limit: Some(2),
            ..Default::default()
        };

        let found = readings.read_by_query(&query).unwrap().into_vec().unwrap();

        assert_eq!(found, vec![Reading::new(4, 9), Reading::new(2, 7)]);

        let statements = observer.statements();
        let ObservedStatement::Single { sql, params } = &statements[0] else {
            panic!("Expected a single statement, got {statements:?}");
        };
        assert_eq!(params.len(), 1);
        assert!(sql.contains("ORDER BY col_a DESC"), "{sql}");
        assert!(sql.ends_with("LIMIT 2"), "{sql}");
    }

    fn test_delete_one_reports_removal(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        counters.write_one(&Counter::new("a", 1)).unwrap();

        assert!(counters.delete_one(&Identifier::from("a")).unwrap());
        assert!(!counters.delete_one(&Identifier::from("a")).unwrap());
        assert!(!counters.contains(&Identifier::from("a")).unwrap());
    }

    fn test_delete_many_and_delete_all(&self) {
        let (_db, factory, observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();
        counters.create().unwrap();
        counters
            .write_many(&[
                Counter::new("a", 1),
                Counter::new("b", 1),
                Counter::new("c", 1),
                Counter::new("d", 1),
            ])
            .unwrap();

        observer.clear();
        counters.delete_many(&[]).unwrap();
        assert!(observer.statements().is_empty());

        counters.delete_many(&ids(&["a", "b", "missing"])).unwrap();
        assert!(!counters.contains(&Identifier::from("a")).unwrap());
        assert!(counters.contains(&Identifier::from("c")).unwrap());

        assert_eq!(counters.delete_all().unwrap(), 2);
        assert!(counters.read_index().unwrap().into_vec().unwrap().is_empty());
    }

    fn test_read_index_returns_every_id(&self) {
        let (_db, factory, _observer) = self.setup();
        let readings = factory.for_table(reading_table()).unwrap();
        readings.create().unwrap();
        readings
            .write_many(&[Reading::new(3, 0), Reading::new(1, 0), Reading::new(2, 0)])
            .unwrap();

        let mut found = readings.read_index().unwrap().into_vec().unwrap();
        found.sort();

        assert_eq!(
            found,
            vec![Identifier::Int64(1), Identifier::Int64(2), Identifier::Int64(3)]
        );
    }

    fn test_create_is_idempotent(&self) {
        let (_db, factory, _observer) = self.setup();
        let counters = factory.for_table(counter_table()).unwrap();

        counters.create().unwrap();
        counters.write_one(&Counter::new("a", 1)).unwrap();
        counters.create().unwrap();

        assert!(counters.contains(&Identifier::from("a")).unwrap());
    }
}
