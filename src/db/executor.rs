//! Statement execution engine.
//!
//! This module runs compiled statements on either an open transaction or a
//! pooled connection and decodes the resulting rows into [`Record`]s.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific query and write operations
//! - `postgres`: PostgreSQL-specific query and write operations
//! - `sqlite`: SQLite-specific query and write operations
//!
//! Each submodule is generic over the sqlx executor so the same code serves a
//! pool and a transaction's connection.

use crate::db::pool::DbPool;
use crate::db::transaction::DbTransaction;
use crate::db::types::{Record, RowToRecord};
use crate::error::DbResult;
use crate::sql::CompiledStatement;
use futures_util::{StreamExt, TryStreamExt};

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Key generated by the last insert on this connection, where the backend
    /// reports one (MySQL, SQLite).
    pub last_insert_id: Option<i64>,
}

/// Fetch rows, stopping after `limit` rows when given.
pub(crate) async fn fetch_rows(
    pool: &DbPool,
    tx: Option<&mut DbTransaction>,
    stmt: &CompiledStatement,
    limit: Option<usize>,
) -> DbResult<Vec<Record>> {
    match tx {
        Some(tx) => impl_tx_dispatch!(tx, {
            MySql(t) => mysql::fetch_rows(&mut **t, stmt, limit).await,
            Postgres(t) => postgres::fetch_rows(&mut **t, stmt, limit).await,
            SQLite(t) => sqlite::fetch_rows(&mut **t, stmt, limit).await,
        }),
        None => impl_db_dispatch!(pool, {
            MySql(p) => mysql::fetch_rows(p, stmt, limit).await,
            Postgres(p) => postgres::fetch_rows(p, stmt, limit).await,
            SQLite(p) => sqlite::fetch_rows(p, stmt, limit).await,
        }),
    }
}

/// Execute a write statement.
pub(crate) async fn execute(
    pool: &DbPool,
    tx: Option<&mut DbTransaction>,
    stmt: &CompiledStatement,
) -> DbResult<ExecResult> {
    match tx {
        Some(tx) => impl_tx_dispatch!(tx, {
            MySql(t) => mysql::execute(&mut **t, stmt).await,
            Postgres(t) => postgres::execute(&mut **t, stmt).await,
            SQLite(t) => sqlite::execute(&mut **t, stmt).await,
        }),
        None => impl_db_dispatch!(pool, {
            MySql(p) => mysql::execute(p, stmt).await,
            Postgres(p) => postgres::execute(p, stmt).await,
            SQLite(p) => sqlite::execute(p, stmt).await,
        }),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::{Executor, MySql};
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows<'c, E>(
        executor: E,
        stmt: &CompiledStatement,
        limit: Option<usize>,
    ) -> DbResult<Vec<Record>>
    where
        E: Executor<'c, Database = MySql>,
    {
        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.values {
            query = bind_mysql_param(query, value);
        }
        let stream = query.fetch(executor);
        let rows: Vec<MySqlRow> = match limit {
            Some(limit) => stream.take(limit).try_collect().await?,
            None => stream.try_collect().await?,
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute<'c, E>(executor: E, stmt: &CompiledStatement) -> DbResult<ExecResult>
    where
        E: Executor<'c, Database = MySql>,
    {
        // Without parameters, run the raw SQL so statements that cannot be
        // prepared (some DDL) still work
        let result = if stmt.values.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for value in &stmt.values {
                query = bind_mysql_param(query, value);
            }
            query.execute(executor).await?
        };
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: i64::try_from(result.last_insert_id()).ok(),
        })
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::{Executor, Postgres};
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows<'c, E>(
        executor: E,
        stmt: &CompiledStatement,
        limit: Option<usize>,
    ) -> DbResult<Vec<Record>>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.values {
            query = bind_postgres_param(query, value);
        }
        let stream = query.fetch(executor);
        let rows: Vec<PgRow> = match limit {
            Some(limit) => stream.take(limit).try_collect().await?,
            None => stream.try_collect().await?,
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute<'c, E>(executor: E, stmt: &CompiledStatement) -> DbResult<ExecResult>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = if stmt.values.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for value in &stmt.values {
                query = bind_postgres_param(query, value);
            }
            query.execute(executor).await?
        };
        // PostgreSQL reports generated keys through RETURNING only
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Executor, Sqlite};
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows<'c, E>(
        executor: E,
        stmt: &CompiledStatement,
        limit: Option<usize>,
    ) -> DbResult<Vec<Record>>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.values {
            query = bind_sqlite_param(query, value);
        }
        let stream = query.fetch(executor);
        let rows: Vec<SqliteRow> = match limit {
            Some(limit) => stream.take(limit).try_collect().await?,
            None => stream.try_collect().await?,
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute<'c, E>(executor: E, stmt: &CompiledStatement) -> DbResult<ExecResult>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let result = if stmt.values.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for value in &stmt.values {
                query = bind_sqlite_param(query, value);
            }
            query.execute(executor).await?
        };
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }
}
