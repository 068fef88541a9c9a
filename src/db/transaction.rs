//! Units of work.
//!
//! A [`Session`] is either Idle (no open transaction) or Active. Calling
//! [`Session::with_transaction`] while Idle begins a transaction, runs the
//! work, and commits on `Ok` or rolls back on `Err`. Calling it while Active
//! joins the open unit of work: the work runs on the same transaction and the
//! outermost caller alone decides commit or rollback.
//!
//! Each running call holds a frame of the unit. If the outermost call is
//! dropped before it finishes (a caller-side timeout, an aborted task), its
//! frame goes with it and the session treats the transaction as abandoned:
//! the next statement or unit of work on the session rolls it back first.

use crate::db::session::Session;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Database-specific transaction wrapper.
///
/// Dropping an uncommitted transaction rolls it back.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(Transaction<'static, MySql>),
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction").field(&self.db_type()).finish()
    }
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        impl_tx_dispatch!(self, {
            MySql(tx) => tx.commit().await.map_err(DbError::from),
            Postgres(tx) => tx.commit().await.map_err(DbError::from),
            SQLite(tx) => tx.commit().await.map_err(DbError::from),
        })
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        impl_tx_dispatch!(self, {
            MySql(tx) => tx.rollback().await.map_err(DbError::from),
            Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        })
    }
}

fn generate_unit_id() -> String {
    format!("uow_{}", Uuid::new_v4().simple())
}

/// The unit of work a session's transaction belongs to.
///
/// Every running `with_transaction` call holds a strong reference to the
/// frame; the session keeps only a weak one, so the live strong count is the
/// nesting depth and drops to zero once every call has returned or been
/// dropped.
#[derive(Debug)]
pub(crate) struct UnitOfWork {
    id: String,
    frames: Weak<()>,
}

impl UnitOfWork {
    fn depth(&self) -> u32 {
        self.frames.strong_count() as u32
    }

    fn is_abandoned(&self) -> bool {
        self.frames.strong_count() == 0
    }
}

impl Session {
    /// Run `work` inside a unit of work.
    ///
    /// The outermost call owns the transaction. Nested calls run on it
    /// directly and never commit or roll back themselves, so an error raised
    /// anywhere inside and propagated outward discards every write of the
    /// unit. The caller's error type passes through unchanged.
    ///
    /// When the session's cancellation token fires, the outermost call rolls
    /// back and returns [`DbError::Cancelled`].
    ///
    /// ```ignore
    /// session
    ///     .with_transaction(async |s| -> DbResult<()> {
    ///         s.insert(&order).await?;
    ///         s.execute("UPDATE stock SET qty = qty - 1 WHERE id = @id", &params).await?;
    ///         Ok(())
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_transaction<R, E, F>(&mut self, work: F) -> Result<R, E>
    where
        F: AsyncFnOnce(&mut Session) -> Result<R, E>,
        E: From<DbError>,
    {
        self.discard_abandoned_unit().await;

        if let Some(frame) = self.unit.as_ref().and_then(|u| u.frames.upgrade()) {
            debug!(
                unit_of_work = ?self.unit_id(),
                depth = self.depth(),
                "Joining active unit of work"
            );
            let result = work(&mut *self).await;
            drop(frame);
            return result;
        }

        if self.is_cancelled() {
            return Err(DbError::cancelled("begin unit of work").into());
        }

        let unit_id = generate_unit_id();
        let frame = Arc::new(());
        self.tx = Some(self.pool.begin().await?);
        self.unit = Some(UnitOfWork {
            id: unit_id.clone(),
            frames: Arc::downgrade(&frame),
        });
        info!(unit_of_work = %unit_id, "Unit of work started");

        let token = self.cancel.clone();
        let outcome = match token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = work(&mut *self) => Some(result),
            },
            None => Some(work(&mut *self).await),
        };

        drop(frame);
        self.unit = None;
        let Some(tx) = self.tx.take() else {
            return Err(DbError::transaction("transaction closed while work was running", unit_id).into());
        };

        match outcome {
            Some(Ok(value)) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::transaction(format!("commit failed: {e}"), &unit_id))?;
                info!(unit_of_work = %unit_id, "Unit of work committed");
                Ok(value)
            }
            Some(Err(err)) => {
                rollback(tx, &unit_id).await;
                Err(err)
            }
            None => {
                warn!(unit_of_work = %unit_id, "Unit of work cancelled");
                rollback(tx, &unit_id).await;
                Err(DbError::cancelled("unit of work").into())
            }
        }
    }

    /// Whether a unit of work is open on this session.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some() && self.depth() > 0
    }

    /// Nesting depth: 0 when Idle, 1 inside the outermost unit of work.
    pub fn depth(&self) -> u32 {
        self.unit.as_ref().map_or(0, UnitOfWork::depth)
    }

    /// Identifier of the open unit of work, as it appears in logs.
    pub fn unit_id(&self) -> Option<&str> {
        self.unit
            .as_ref()
            .filter(|u| !u.is_abandoned())
            .map(|u| u.id.as_str())
    }

    /// Roll back a transaction whose unit of work was dropped mid-flight.
    pub(crate) async fn discard_abandoned_unit(&mut self) {
        if !self.unit.as_ref().is_some_and(UnitOfWork::is_abandoned) {
            return;
        }
        let unit_id = self.unit.take().map(|u| u.id).unwrap_or_default();
        warn!(unit_of_work = %unit_id, "Unit of work abandoned before completion");
        if let Some(tx) = self.tx.take() {
            rollback(tx, &unit_id).await;
        }
    }
}

/// Roll back, logging instead of returning a failure so the caller's error
/// is the one reported.
async fn rollback(tx: DbTransaction, unit_id: &str) {
    match tx.rollback().await {
        Ok(()) => info!(unit_of_work = %unit_id, "Unit of work rolled back"),
        Err(e) => warn!(unit_of_work = %unit_id, error = %e, "Rollback failed"),
    }
}
