//! Conversion between records, identifiers and the values stored in their columns.
//!
//! Records are stored as their JSON bytes. Decoding is exact: bytes produced by
//! [`serialize`] always decode back to an equal record.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{DatabaseError, DatabaseValue, id::IdKind, id::Identifier};

/// A record kind that can be stored in a table.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> Message for T {}

#[derive(Debug, Error)]
pub enum CorruptRecordError {
    #[error("Row is missing column '{0}'")]
    MissingColumn(String),
    #[error("Column '{column}' holds a {found} value where {expected} was expected")]
    UnexpectedValue {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Column '{column}' holds {value} which does not fit in {expected}")]
    OutOfRange {
        column: String,
        expected: &'static str,
        value: i64,
    },
    #[error("Failed to decode record from column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: serde_json::Error,
    },
}

/// # Errors
///
/// * If the record fails to serialize
pub fn serialize<M: Message>(message: &M) -> Result<Vec<u8>, DatabaseError> {
    serde_json::to_vec(message).map_err(DatabaseError::Encode)
}

/// # Errors
///
/// * If the bytes are not a valid encoding of `M`
pub fn deserialize<M: Message>(bytes: &[u8]) -> Result<M, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Decodes the payload column value of a row into a record.
///
/// # Errors
///
/// * If the value is not a byte array
/// * If the bytes are not a valid encoding of `M`
pub fn decode_payload<M: Message>(
    column: &str,
    value: &DatabaseValue,
) -> Result<M, CorruptRecordError> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| CorruptRecordError::UnexpectedValue {
            column: column.to_string(),
            expected: "bytes",
            found: value.kind_name(),
        })?;

    deserialize(bytes).map_err(|source| CorruptRecordError::Decode {
        column: column.to_string(),
        source,
    })
}

#[must_use]
pub fn encode_id(id: &Identifier) -> DatabaseValue {
    match id {
        Identifier::Int64(value) => DatabaseValue::Int64(*value),
        Identifier::Int32(value) => DatabaseValue::Int32(*value),
        Identifier::String(value) => DatabaseValue::String(value.clone()),
    }
}

/// Reads an identifier of the given kind back from a column value.
///
/// # Errors
///
/// * If the value does not hold an identifier of `kind`
pub fn decode_id(
    kind: IdKind,
    column: &str,
    value: &DatabaseValue,
) -> Result<Identifier, CorruptRecordError> {
    let unexpected = |expected| CorruptRecordError::UnexpectedValue {
        column: column.to_string(),
        expected,
        found: value.kind_name(),
    };

    match kind {
        IdKind::Int64 => value
            .as_i64()
            .map(Identifier::Int64)
            .ok_or_else(|| unexpected("int64")),
        IdKind::Int32 => {
            let wide = value.as_i64().ok_or_else(|| unexpected("int32"))?;
            i32::try_from(wide)
                .map(Identifier::Int32)
                .map_err(|_| CorruptRecordError::OutOfRange {
                    column: column.to_string(),
                    expected: "int32",
                    value: wide,
                })
        }
        IdKind::String | IdKind::Message => value
            .as_str()
            .map(|x| Identifier::String(x.to_string()))
            .ok_or_else(|| unexpected("string")),
    }
}
