use std::fmt;

use serde::Serialize;

use crate::{DatabaseError, schema::DataType};

/// The identifier of a stored record.
///
/// Structured identifiers are carried as [`Identifier::String`] holding their compact
/// JSON form, see [`Identifier::from_message`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Int64(i64),
    Int32(i32),
    String(String),
}

/// Runtime kind of the identifiers stored in an id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Int64,
    Int32,
    String,
    /// A structured value stored as its compact JSON text.
    Message,
}

impl IdKind {
    /// Column type used for this kind when the id column does not declare one.
    #[must_use]
    pub const fn default_data_type(self) -> DataType {
        match self {
            Self::Int64 => DataType::BigInt,
            Self::Int32 => DataType::Int,
            Self::String | Self::Message => DataType::VarChar(255),
        }
    }
}

impl Identifier {
    #[must_use]
    pub const fn kind(&self) -> IdKind {
        match self {
            Self::Int64(_) => IdKind::Int64,
            Self::Int32(_) => IdKind::Int32,
            Self::String(_) => IdKind::String,
        }
    }

    /// Converts an identifier to the form a column of `kind` stores, so that ids read
    /// back from the column compare equal to the ids records report.
    ///
    /// Integers change width, or become their decimal text for string columns. Text
    /// that parses as an integer becomes one for integer columns. Anything that does
    /// not fit is left as it is.
    #[must_use]
    pub fn normalized(self, kind: IdKind) -> Self {
        match (kind, self) {
            (IdKind::Int64, Self::Int32(value)) => Self::Int64(i64::from(value)),
            (IdKind::Int32, Self::Int64(value)) => {
                i32::try_from(value).map_or(Self::Int64(value), Self::Int32)
            }
            (IdKind::String | IdKind::Message, Self::Int64(value)) => {
                Self::String(value.to_string())
            }
            (IdKind::String | IdKind::Message, Self::Int32(value)) => {
                Self::String(value.to_string())
            }
            (IdKind::Int64, Self::String(value)) => {
                value.parse().map_or(Self::String(value), Self::Int64)
            }
            (IdKind::Int32, Self::String(value)) => {
                value.parse().map_or(Self::String(value), Self::Int32)
            }
            (_, id) => id,
        }
    }

    /// Builds an identifier from a structured value by taking its compact JSON text.
    ///
    /// Structs serialize their fields in declaration order with no whitespace, so equal
    /// values of such types produce equal identifiers. Values holding a `HashMap` or
    /// another collection with unstable iteration order carry no such guarantee.
    ///
    /// # Errors
    ///
    /// * If the value fails to serialize
    pub fn from_message<M: Serialize + ?Sized>(message: &M) -> Result<Self, DatabaseError> {
        serde_json::to_string(message)
            .map(Self::String)
            .map_err(DatabaseError::Encode)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(value) => write!(f, "{value}"),
            Self::Int32(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Records that know their own identifier.
pub trait AsId {
    fn as_id(&self) -> Identifier;
}
