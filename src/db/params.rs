//! Parameter binding utilities for database queries.
//!
//! This module binds [`SqlValue`]s to database-specific query objects. NULLs
//! are bound with the Rust type matching their [`ValueKind`] so PostgreSQL
//! receives a correctly typed parameter.

use crate::models::{SqlValue, ValueKind};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        SqlValue::Null(kind) => match kind {
            ValueKind::Bool => query.bind(None::<bool>),
            ValueKind::Int => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Bytes => query.bind(None::<Vec<u8>>),
            ValueKind::Timestamp => query.bind(None::<DateTime<Utc>>),
            ValueKind::Json => query.bind(None::<Json<JsonValue>>),
            ValueKind::Text | ValueKind::Unknown => query.bind(None::<String>),
        },
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        SqlValue::Null(kind) => match kind {
            ValueKind::Bool => query.bind(None::<bool>),
            ValueKind::Int => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Bytes => query.bind(None::<Vec<u8>>),
            ValueKind::Timestamp => query.bind(None::<DateTime<Utc>>),
            ValueKind::Json => query.bind(None::<Json<JsonValue>>),
            ValueKind::Text | ValueKind::Unknown => query.bind(None::<String>),
        },
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        // SQLite NULLs are untyped
        SqlValue::Null(_) => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Timestamp(v) => query.bind(*v),
        // SQLite doesn't have native JSON type, store as string
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}
