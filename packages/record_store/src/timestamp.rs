//! Timestamps stored as a seconds column plus a nanoseconds column.

use chrono::{DateTime, Utc};

use crate::{DatabaseValue, schema::DataType, table::DataColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimestampParts {
    pub seconds: i64,
    pub nanos: i32,
}

impl TimestampParts {
    /// `None` if the parts are outside the range `chrono` can represent.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let nanos = u32::try_from(self.nanos).ok()?;
        DateTime::from_timestamp(self.seconds, nanos)
    }
}

impl From<DateTime<Utc>> for TimestampParts {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            nanos: i32::try_from(value.timestamp_subsec_nanos()).unwrap_or(i32::MAX),
        }
    }
}

impl<R> DataColumn<R> {
    /// A `BIGINT` column holding the whole seconds of a record's timestamp.
    #[must_use]
    pub fn timestamp_seconds(
        name: impl Into<String>,
        timestamp: impl Fn(&R) -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self::value(name, DataType::BigInt, move |record| {
            DatabaseValue::Int64(TimestampParts::from(timestamp(record)).seconds)
        })
    }

    /// An `INT` column holding the nanosecond part of a record's timestamp.
    #[must_use]
    pub fn timestamp_nanos(
        name: impl Into<String>,
        timestamp: impl Fn(&R) -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self::value(name, DataType::Int, move |record| {
            DatabaseValue::Int32(TimestampParts::from(timestamp(record)).nanos)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn splits_and_restores_datetime() {
        let datetime = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

        let parts = TimestampParts::from(datetime);

        assert_eq!(
            parts,
            TimestampParts {
                seconds: 1_700_000_000,
                nanos: 123_456_789,
            }
        );
        assert_eq!(parts.to_datetime(), Some(datetime));
    }

    #[test_log::test]
    fn negative_nanos_do_not_convert() {
        let parts = TimestampParts {
            seconds: 0,
            nanos: -1,
        };

        assert_eq!(parts.to_datetime(), None);
    }

    #[test_log::test]
    fn timestamp_columns_extract_each_part() {
        struct Event {
            at: DateTime<Utc>,
        }

        let event = Event {
            at: Utc.timestamp_opt(10, 20).unwrap(),
        };
        let seconds = DataColumn::timestamp_seconds("at_seconds", |x: &Event| x.at);
        let nanos = DataColumn::timestamp_nanos("at_nanos", |x: &Event| x.at);

        let crate::table::ValueSource::Extract(seconds) = seconds.source else {
            panic!("expected an extracted column");
        };
        let crate::table::ValueSource::Extract(nanos) = nanos.source else {
            panic!("expected an extracted column");
        };

        assert_eq!(seconds(&event), DatabaseValue::Int64(10));
        assert_eq!(nanos(&event), DatabaseValue::Int32(20));
    }
}
