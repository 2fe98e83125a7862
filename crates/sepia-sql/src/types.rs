//! Logical column types and their PostgreSQL names.

use crate::{Error, Result};

/// A logical column type, mapped to a PostgreSQL type at render time.
///
/// `Custom` passes any other type name through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Id,
    BinaryId,
    Serial,
    BigSerial,
    Integer,
    Float,
    Boolean,
    String,
    Binary,
    Map,
    Decimal,
    Date,
    Time,
    TimeUsec,
    UtcDatetime,
    UtcDatetimeUsec,
    NaiveDatetime,
    NaiveDatetimeUsec,
    Array(Box<ColumnType>),
    Custom(String),
}

impl ColumnType {
    /// The base PostgreSQL type name.
    ///
    /// `map_type` is the configured SQL type for map columns; rendering a
    /// map without one is an error.
    pub fn to_db(&self, map_type: Option<&str>) -> Result<String> {
        Ok(match self {
            ColumnType::Id => "integer".into(),
            ColumnType::BinaryId => "uuid".into(),
            ColumnType::Serial => "serial".into(),
            ColumnType::BigSerial => "bigserial".into(),
            ColumnType::Integer => "integer".into(),
            ColumnType::Float => "float".into(),
            ColumnType::Boolean => "boolean".into(),
            ColumnType::String => "varchar".into(),
            ColumnType::Binary => "bytea".into(),
            ColumnType::Map => map_type.ok_or(Error::MapTypeNotConfigured)?.into(),
            ColumnType::Decimal => "decimal".into(),
            ColumnType::Date => "date".into(),
            ColumnType::Time | ColumnType::TimeUsec => "time".into(),
            ColumnType::UtcDatetime
            | ColumnType::UtcDatetimeUsec
            | ColumnType::NaiveDatetime
            | ColumnType::NaiveDatetimeUsec => "timestamp".into(),
            ColumnType::Array(inner) => format!("{}[]", inner.to_db(map_type)?),
            ColumnType::Custom(name) => name.clone(),
        })
    }

    /// The type used when casting a tagged expression. Integer kinds cast
    /// as `bigint`; arrays map element-wise.
    pub fn tagged_to_db(&self, map_type: Option<&str>) -> Result<String> {
        match self {
            ColumnType::Id | ColumnType::Integer => Ok("bigint".into()),
            ColumnType::Array(inner) => Ok(format!("{}[]", inner.tagged_to_db(map_type)?)),
            other => other.to_db(map_type),
        }
    }
}
