//! Database engine identification.
//!
//! The engine is detected once per [`OperationFactory`](crate::operation::OperationFactory)
//! from the product name a data source reports, and decides the type mapping, the
//! parameter placeholder style and whether single writes may use a native upsert.

use std::fmt;

use crate::{schema::mapping::TypeMapping, sql::Placeholder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceMetadata {
    pub product_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Generic,
    MySql,
    Postgres,
    Sqlite,
}

/// Flavour of the `INSERT` conflict clause an engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDialect {
    /// `ON DUPLICATE KEY UPDATE c = VALUES(c)`
    OnDuplicateKey,
    /// `ON CONFLICT (id) DO UPDATE SET c = excluded.c`
    OnConflict,
}

impl Engine {
    /// Matches the product name case-insensitively. Unknown products map to
    /// [`Engine::Generic`].
    #[must_use]
    pub fn detect(metadata: &DataSourceMetadata) -> Self {
        Self::from_product_name(&metadata.product_name)
    }

    #[must_use]
    pub fn from_product_name(product_name: &str) -> Self {
        let product = product_name.to_lowercase();

        if product.contains("mysql") || product.contains("mariadb") {
            Self::MySql
        } else if product.contains("postgresql") {
            Self::Postgres
        } else if product.contains("sqlite") {
            Self::Sqlite
        } else {
            Self::Generic
        }
    }

    #[must_use]
    pub const fn upsert(self) -> Option<UpsertDialect> {
        match self {
            Self::Generic => None,
            Self::MySql => Some(UpsertDialect::OnDuplicateKey),
            Self::Postgres | Self::Sqlite => Some(UpsertDialect::OnConflict),
        }
    }

    #[must_use]
    pub const fn placeholder(self) -> Placeholder {
        match self {
            Self::Postgres => Placeholder::Numbered,
            Self::Generic | Self::MySql | Self::Sqlite => Placeholder::QuestionMark,
        }
    }

    #[must_use]
    pub fn type_mapping(self) -> TypeMapping {
        match self {
            Self::Generic | Self::MySql => TypeMapping::mysql(),
            Self::Postgres => TypeMapping::postgres(),
            Self::Sqlite => TypeMapping::sqlite(),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "Generic",
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        })
    }
}
