//! Database-agnostic row decoding.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders turn each column into a [`SqlValue`]
//!
//! Decoded rows are [`Record`]s: ordered `(column name, value)` pairs that
//! entities are materialised from.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, SqlValue, ValueKind};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Records
// =============================================================================

/// One decoded result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn from_pairs(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Value of the column named `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Remove and return the column named `name`, matched case-insensitively.
    pub fn take(&mut self, name: &str) -> Option<SqlValue> {
        let pos = self
            .columns
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.columns.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for Record {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Timestamp,
    Unknown,
}

impl TypeCategory {
    /// Kind used for NULLs found in a column of this category.
    pub fn value_kind(self) -> ValueKind {
        match self {
            TypeCategory::Integer => ValueKind::Int,
            TypeCategory::Float => ValueKind::Float,
            TypeCategory::Decimal | TypeCategory::Text => ValueKind::Text,
            TypeCategory::Boolean => ValueKind::Bool,
            TypeCategory::Binary => ValueKind::Bytes,
            TypeCategory::Json => ValueKind::Json,
            TypeCategory::Timestamp => ValueKind::Timestamp,
            TypeCategory::Unknown => ValueKind::Unknown,
        }
    }
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "citext" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Trait for converting database rows to records.
pub trait RowToRecord {
    fn to_record(&self) -> DbResult<Record>;
}

fn column_error(name: &str, type_name: &str, err: sqlx::Error) -> DbError {
    DbError::decode(format!(
        "column '{}' ({}) could not be decoded: {}",
        name, type_name, err
    ))
}

impl RowToRecord for MySqlRow {
    fn to_record(&self) -> DbResult<Record> {
        let mut columns = Vec::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let type_name = col.type_info().name();
            let category = categorize_type(type_name, DatabaseType::MySQL);
            let value = mysql::decode_column(self, idx, category)
                .map_err(|e| column_error(col.name(), type_name, e))?;
            columns.push((col.name().to_string(), value));
        }
        Ok(Record::from_pairs(columns))
    }
}

impl RowToRecord for PgRow {
    fn to_record(&self) -> DbResult<Record> {
        let mut columns = Vec::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let type_name = col.type_info().name();
            let category = categorize_type(type_name, DatabaseType::PostgreSQL);
            let value = postgres::decode_column(self, idx, type_name, category)
                .map_err(|e| column_error(col.name(), type_name, e))?;
            columns.push((col.name().to_string(), value));
        }
        Ok(Record::from_pairs(columns))
    }
}

impl RowToRecord for SqliteRow {
    fn to_record(&self) -> DbResult<Record> {
        let mut columns = Vec::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let declared = col.type_info().name();
            let mut category = categorize_type(declared, DatabaseType::SQLite);
            // Expression columns have no declared type; use the stored value's
            if category == TypeCategory::Unknown {
                let raw = self.try_get_raw(idx)?;
                if !raw.is_null() {
                    category = categorize_type(raw.type_info().name(), DatabaseType::SQLite);
                }
            }
            let value = sqlite::decode_column(self, idx, category)
                .map_err(|e| column_error(col.name(), declared, e))?;
            columns.push((col.name().to_string(), value));
        }
        Ok(Record::from_pairs(columns))
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

fn float_or_null(v: Option<f64>) -> SqlValue {
    v.map(SqlValue::Float)
        .unwrap_or(SqlValue::Null(ValueKind::Float))
}

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDateTime, Utc};

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null(category.value_kind()));
        }
        match category {
            TypeCategory::Decimal => Ok(SqlValue::Text(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(SqlValue::Bool(row.try_get::<bool, _>(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Json => Ok(SqlValue::Json(row.try_get::<serde_json::Value, _>(idx)?)),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        // Try signed types
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(SqlValue::Int(v));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        let v = row.try_get::<u64, _>(idx)?;
        i64::try_from(v)
            .map(SqlValue::Int)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(SqlValue::Float(v));
        }
        Ok(float_or_null(
            row.try_get::<Option<f32>, _>(idx)?.map(f64::from),
        ))
    }

    fn decode_timestamp(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Ok(SqlValue::Timestamp(v));
        }
        // DATETIME has no zone; stored values are UTC
        let v = row.try_get::<NaiveDateTime, _>(idx)?;
        Ok(SqlValue::Timestamp(v.and_utc()))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Ok(SqlValue::Text(v));
        }
        // DATE, TIME and other types without a dedicated category
        if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
            return Ok(SqlValue::Text(v.to_string()));
        }
        Ok(SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?))
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Result<SqlValue, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null(category.value_kind()));
        }
        match category {
            TypeCategory::Decimal => Ok(SqlValue::Text(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(SqlValue::Bool(row.try_get::<bool, _>(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Json => Ok(SqlValue::Json(row.try_get::<serde_json::Value, _>(idx)?)),
            TypeCategory::Timestamp => decode_timestamp(row, idx, type_name),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(SqlValue::Int(v.into()));
        }
        Ok(SqlValue::Int(row.try_get::<i64, _>(idx)?))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(SqlValue::Float(v));
        }
        Ok(SqlValue::Float(row.try_get::<f32, _>(idx)?.into()))
    }

    fn decode_timestamp(row: &PgRow, idx: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
        if type_name.eq_ignore_ascii_case("timestamptz") {
            return Ok(SqlValue::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?));
        }
        let v = row.try_get::<NaiveDateTime, _>(idx)?;
        Ok(SqlValue::Timestamp(v.and_utc()))
    }

    fn decode_text(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Ok(SqlValue::Text(v));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Ok(SqlValue::Text(v.to_string()));
        }
        let v = row.try_get::<NaiveTime, _>(idx)?;
        Ok(SqlValue::Text(v.to_string()))
    }
}

mod sqlite {
    use super::*;
    use crate::models::value::parse_timestamp;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null(category.value_kind()));
        }
        match category {
            TypeCategory::Integer => Ok(SqlValue::Int(row.try_get::<i64, _>(idx)?)),
            TypeCategory::Boolean => Ok(SqlValue::Bool(row.try_get::<bool, _>(idx)?)),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => Ok(SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => {
                Ok(SqlValue::Text(row.try_get::<String, _>(idx)?))
            }
        }
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        Ok(float_or_null(row.try_get::<Option<f64>, _>(idx)?))
    }

    fn decode_timestamp(row: &SqliteRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        // SQLite stores timestamps as text in whatever form was written
        let text = row.try_get::<String, _>(idx)?;
        match parse_timestamp(&text) {
            Some(ts) => Ok(SqlValue::Timestamp(ts)),
            None => Ok(SqlValue::Text(text)),
        }
    }

    fn decode_json(row: &SqliteRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        let text = row.try_get::<String, _>(idx)?;
        match serde_json::from_str(&text) {
            Ok(json) => Ok(SqlValue::Json(json)),
            Err(_) => Ok(SqlValue::Text(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_timestamp() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::SQLite),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("TIMESTAMP", DatabaseType::MySQL),
            TypeCategory::Timestamp
        );
    }

    #[test]
    fn test_categorize_type_text_and_unknown() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
    }

    #[test]
    fn test_null_kind_follows_category() {
        assert_eq!(TypeCategory::Timestamp.value_kind(), ValueKind::Timestamp);
        assert_eq!(TypeCategory::Decimal.value_kind(), ValueKind::Text);
    }

    #[test]
    fn test_record_lookup_is_case_insensitive() {
        let mut record = Record::from_pairs(vec![
            ("Id".to_string(), SqlValue::Int(1)),
            ("NAME".to_string(), SqlValue::from("a")),
        ]);
        assert_eq!(record.get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(record.first(), Some(&SqlValue::Int(1)));
        assert_eq!(record.take("name"), Some(SqlValue::from("a")));
        assert_eq!(record.take("name"), None);
        assert_eq!(record.len(), 1);
    }
}
