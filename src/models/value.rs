//! Bindable and decodable SQL values.
//!
//! `SqlValue` is the single currency between entities, generated statements
//! and database rows. Entities read their fields into it and write decoded
//! row values back out of it through [`FromSqlValue`].

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// Logical type of a value, used to bind correctly typed NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unknown,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
    Json,
}

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL, tagged with the kind of the Rust type it came from
    Null(ValueKind),
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Json(JsonValue),
}

impl SqlValue {
    /// An untyped NULL.
    pub fn null() -> Self {
        Self::Null(ValueKind::Unknown)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null(kind) => *kind,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Json(_) => ValueKind::Json,
        }
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }
}

impl Default for SqlValue {
    fn default() -> Self {
        Self::null()
    }
}

/// Rust types with a fixed SQL kind.
pub trait SqlType {
    const KIND: ValueKind;
}

macro_rules! impl_sql_value_from {
    ($($ty:ty => $kind:ident, $conv:expr);+ $(;)?) => {
        $(
            impl SqlType for $ty {
                const KIND: ValueKind = ValueKind::$kind;
            }

            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    let conv: fn($ty) -> SqlValue = $conv;
                    conv(value)
                }
            }
        )+
    };
}

impl_sql_value_from! {
    bool => Bool, SqlValue::Bool;
    i16 => Int, |v| SqlValue::Int(v.into());
    i32 => Int, |v| SqlValue::Int(v.into());
    i64 => Int, SqlValue::Int;
    u32 => Int, |v| SqlValue::Int(v.into());
    f32 => Float, |v| SqlValue::Float(v.into());
    f64 => Float, SqlValue::Float;
    String => Text, SqlValue::Text;
    Vec<u8> => Bytes, SqlValue::Bytes;
    DateTime<Utc> => Timestamp, SqlValue::Timestamp;
    JsonValue => Json, SqlValue::Json;
}

impl SqlType for &str {
    const KIND: ValueKind = ValueKind::Text;
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue> + SqlType,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null(T::KIND),
        }
    }
}

/// Conversion from a decoded column value into a Rust field type.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> DbResult<Self>;
}

fn mismatch(expected: &str, value: &SqlValue) -> DbError {
    DbError::decode(format!(
        "expected {}, found {}",
        expected,
        value.type_name()
    ))
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        Ok(value)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            // SQLite and MySQL store booleans as integers
            SqlValue::Int(v) => Ok(v != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Int(v) => Ok(v),
            SqlValue::Bool(v) => Ok(v as i64),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        let wide = i64::from_sql_value(value)?;
        i32::try_from(wide).map_err(|_| DbError::decode(format!("{} out of range for i32", wide)))
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Float(v) => Ok(v),
            SqlValue::Int(v) => Ok(v as f64),
            // Exact DECIMAL/NUMERIC values arrive as text
            SqlValue::Text(ref s) => s.parse().map_err(|_| mismatch("float", &value)),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Text(v) => Ok(v),
            SqlValue::Bytes(v) => String::from_utf8(v)
                .map_err(|e| DbError::decode(format!("invalid UTF-8 in text column: {}", e))),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v),
            SqlValue::Text(v) => Ok(v.into_bytes()),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            SqlValue::Text(ref s) => parse_timestamp(s).ok_or_else(|| mismatch("timestamp", &value)),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl FromSqlValue for JsonValue {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Json(v) => Ok(v),
            SqlValue::Text(s) => serde_json::from_str(&s)
                .map_err(|e| DbError::decode(format!("invalid JSON: {}", e))),
            SqlValue::Null(_) => Ok(JsonValue::Null),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> DbResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}

/// Parse the textual timestamp forms SQLite and MySQL hand back.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(s, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
