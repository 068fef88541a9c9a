//! Request-scoped database sessions.
//!
//! A session carries everything a chain of data-access calls shares: the
//! pool, the open transaction (if any), the unit of work it belongs to and
//! an optional cancellation token. Pass `&mut Session` down the call
//! chain instead of relying on ambient state.

use crate::db::executor::{self, ExecResult};
use crate::db::pool::DbPool;
use crate::db::transaction::{DbTransaction, UnitOfWork};
use crate::db::types::Record;
use crate::error::{DbError, DbResult};
use crate::metadata::Entity;
use crate::models::{DatabaseType, SqlValue};
use crate::sql::{CompiledStatement, Dialect, SqlGenerator, Statement};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Session {
    pub(crate) pool: DbPool,
    pub(crate) tx: Option<DbTransaction>,
    pub(crate) unit: Option<UnitOfWork>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl Session {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self {
            pool,
            tx: None,
            unit: None,
            cancel: None,
        }
    }

    /// Abort in-flight statements and units of work when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::from(self.db_type())
    }

    /// SQL generator for `T` in this session's dialect.
    pub fn generator<T: Entity>(&self) -> DbResult<SqlGenerator<T>> {
        SqlGenerator::new(self.dialect())
    }

    fn compile(&self, stmt: &Statement) -> DbResult<CompiledStatement> {
        let compiled = stmt.compile(self.db_type())?;
        debug!(
            sql = %compiled.sql,
            params = compiled.values.len(),
            unit_of_work = ?self.unit_id(),
            "Executing statement"
        );
        Ok(compiled)
    }

    /// Run a statement and decode every row.
    pub async fn fetch_records(&mut self, stmt: &Statement) -> DbResult<Vec<Record>> {
        self.discard_abandoned_unit().await;
        let compiled = self.compile(stmt)?;
        let rows = guarded(
            self.cancel.as_ref(),
            "query",
            executor::fetch_rows(&self.pool, self.tx.as_mut(), &compiled, None),
        )
        .await?;
        debug!(rows = rows.len(), "Query completed");
        Ok(rows)
    }

    /// Run a statement and decode the first row, if any.
    pub async fn fetch_optional_record(&mut self, stmt: &Statement) -> DbResult<Option<Record>> {
        self.discard_abandoned_unit().await;
        let compiled = self.compile(stmt)?;
        let rows = guarded(
            self.cancel.as_ref(),
            "query",
            executor::fetch_rows(&self.pool, self.tx.as_mut(), &compiled, Some(1)),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    /// First column of the first row.
    pub async fn fetch_scalar(&mut self, stmt: &Statement) -> DbResult<Option<SqlValue>> {
        Ok(self
            .fetch_optional_record(stmt)
            .await?
            .and_then(|record| record.into_iter().next().map(|(_, value)| value)))
    }

    /// Run a write statement.
    pub async fn execute_statement(&mut self, stmt: &Statement) -> DbResult<ExecResult> {
        self.discard_abandoned_unit().await;
        let compiled = self.compile(stmt)?;
        let result = guarded(
            self.cancel.as_ref(),
            "execute",
            executor::execute(&self.pool, self.tx.as_mut(), &compiled),
        )
        .await?;
        debug!(rows_affected = result.rows_affected, "Statement completed");
        Ok(result)
    }
}

/// Race `fut` against the cancellation token. A fired token wins, dropping
/// the statement future.
async fn guarded<T>(
    token: Option<&CancellationToken>,
    operation: &str,
    fut: impl Future<Output = DbResult<T>>,
) -> DbResult<T> {
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!(operation, "Statement cancelled");
                Err(DbError::cancelled(operation))
            }
            result = fut => result,
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Params;

    async fn session() -> Session {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Session::new(DbPool::SQLite(pool))
    }

    #[tokio::test]
    async fn test_fetch_scalar() {
        let mut session = session().await;
        let value = session
            .fetch_scalar(&Statement::new("SELECT 41 + @n AS answer", params! { "n" => 1i64 }))
            .await
            .unwrap();
        assert_eq!(value, Some(SqlValue::Int(42)));
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_before_execution() {
        let mut session = session().await;
        let err = session
            .fetch_records(&Statement::new("SELECT @missing AS x", Params::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::MissingParameter { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_statement() {
        let token = CancellationToken::new();
        let mut session = session().await.with_cancellation(token.clone());
        token.cancel();

        let err = session
            .fetch_records(&Statement::new("SELECT 1 AS x", Params::new()))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_session_reports_dialect() {
        let session = session().await;
        assert_eq!(session.db_type(), DatabaseType::SQLite);
        assert_eq!(session.dialect(), Dialect::Sqlite);
        assert!(session.cancellation_token().is_none());
    }
}
