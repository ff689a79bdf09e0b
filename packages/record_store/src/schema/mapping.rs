use std::collections::BTreeMap;

use crate::{ConfigurationError, schema::DataType};

/// SQL names of the built-in column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTypeNames {
    pub int: String,
    pub big_int: String,
    pub bool: String,
    /// Rendered as `<varchar>(<length>)`.
    pub varchar: String,
    pub text: String,
    pub blob: String,
}

/// How a byte string is written as a literal in DDL defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesLiteral {
    /// `X'0A1B'`
    Hex,
    /// `'\x0A1B'`, the `bytea` hex input format.
    Escaped,
}

/// Maps every [`DataType`] to an engine-specific SQL type name.
///
/// All built-in types are always mapped, so [`TypeMapping::type_name`] only fails for a
/// [`DataType::Custom`] type that was never registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    name: String,
    base: BaseTypeNames,
    custom: BTreeMap<String, String>,
    bytes_literal: BytesLiteral,
}

impl TypeMapping {
    /// # Errors
    ///
    /// * If any of the base names is empty
    pub fn new(name: impl Into<String>, base: BaseTypeNames) -> Result<Self, ConfigurationError> {
        let name = name.into();

        let entries = [
            (&base.int, DataType::Int),
            (&base.big_int, DataType::BigInt),
            (&base.bool, DataType::Bool),
            (&base.varchar, DataType::VarChar(0)),
            (&base.text, DataType::Text),
            (&base.blob, DataType::Blob),
        ];

        for (sql_name, data_type) in entries {
            if sql_name.trim().is_empty() {
                return Err(ConfigurationError::EmptyTypeName {
                    mapping: name,
                    data_type,
                });
            }
        }

        Ok(Self {
            name,
            base,
            custom: BTreeMap::new(),
            bytes_literal: BytesLiteral::Hex,
        })
    }

    #[must_use]
    pub const fn with_bytes_literal(mut self, bytes_literal: BytesLiteral) -> Self {
        self.bytes_literal = bytes_literal;
        self
    }

    /// Registers the SQL name used for `DataType::Custom(custom)`.
    ///
    /// # Errors
    ///
    /// * If `sql_name` is empty
    pub fn with_custom(
        mut self,
        custom: impl Into<String>,
        sql_name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let custom = custom.into();
        let sql_name = sql_name.into();

        if sql_name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTypeName {
                mapping: self.name,
                data_type: DataType::Custom(custom),
            });
        }

        self.custom.insert(custom, sql_name);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn bytes_literal(&self) -> BytesLiteral {
        self.bytes_literal
    }

    /// # Errors
    ///
    /// * If `data_type` is a custom type this mapping does not name
    pub fn type_name(&self, data_type: &DataType) -> Result<String, ConfigurationError> {
        Ok(match data_type {
            DataType::Int => self.base.int.clone(),
            DataType::BigInt => self.base.big_int.clone(),
            DataType::Bool => self.base.bool.clone(),
            DataType::VarChar(length) => format!("{}({length})", self.base.varchar),
            DataType::Text => self.base.text.clone(),
            DataType::Blob => self.base.blob.clone(),
            DataType::Custom(custom) => self.custom.get(custom).cloned().ok_or_else(|| {
                ConfigurationError::UnmappedType {
                    mapping: self.name.clone(),
                    data_type: data_type.clone(),
                }
            })?,
        })
    }

    /// Also used for engines without a dedicated mapping.
    #[must_use]
    pub fn mysql() -> Self {
        Self::predefined("MySQL", "INT", "BIGINT", "BLOB")
    }

    #[must_use]
    pub fn postgres() -> Self {
        Self::predefined("PostgreSQL", "INT", "BIGINT", "BYTEA")
            .with_bytes_literal(BytesLiteral::Escaped)
    }

    #[must_use]
    pub fn sqlite() -> Self {
        Self::predefined("SQLite", "INTEGER", "BIGINT", "BLOB")
    }

    fn predefined(name: &str, int: &str, big_int: &str, blob: &str) -> Self {
        Self {
            name: name.to_string(),
            base: BaseTypeNames {
                int: int.to_string(),
                big_int: big_int.to_string(),
                bool: "BOOLEAN".to_string(),
                varchar: "VARCHAR".to_string(),
                text: "TEXT".to_string(),
                blob: blob.to_string(),
            },
            custom: BTreeMap::new(),
            bytes_literal: BytesLiteral::Hex,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn predefined_mappings_cover_every_builtin_type() {
        for mapping in [
            TypeMapping::mysql(),
            TypeMapping::postgres(),
            TypeMapping::sqlite(),
        ] {
            for data_type in [
                DataType::Int,
                DataType::BigInt,
                DataType::Bool,
                DataType::VarChar(16),
                DataType::Text,
                DataType::Blob,
            ] {
                assert!(!mapping.type_name(&data_type).unwrap().is_empty());
            }
        }
    }

    #[test_log::test]
    fn postgres_stores_bytes_as_bytea() {
        assert_eq!(
            TypeMapping::postgres().type_name(&DataType::Blob).unwrap(),
            "BYTEA"
        );
        assert_eq!(
            TypeMapping::mysql().type_name(&DataType::VarChar(255)).unwrap(),
            "VARCHAR(255)"
        );
    }

    #[test_log::test]
    fn custom_types_resolve_once_registered() {
        let mapping = TypeMapping::mysql()
            .with_custom("point", "POINT")
            .unwrap();

        assert_eq!(
            mapping
                .type_name(&DataType::Custom("point".into()))
                .unwrap(),
            "POINT"
        );
        assert!(
            mapping
                .type_name(&DataType::Custom("polygon".into()))
                .is_err()
        );
    }

    #[test_log::test]
    fn empty_base_name_is_rejected() {
        let result = TypeMapping::new(
            "broken",
            BaseTypeNames {
                int: "INT".into(),
                big_int: "BIGINT".into(),
                bool: String::new(),
                varchar: "VARCHAR".into(),
                text: "TEXT".into(),
                blob: "BLOB".into(),
            },
        );

        assert_eq!(
            result,
            Err(ConfigurationError::EmptyTypeName {
                mapping: "broken".into(),
                data_type: DataType::Bool,
            })
        );
    }
}
