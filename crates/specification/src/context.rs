//! Shared persistence context.
//!
//! sea-orm has no change tracker, so the context fills that gap: it owns the
//! connection, the (at most one) open transaction and the queue of staged
//! changes. Repositories hold an `Arc` to it; only the unit of work drives
//! transaction boundaries.

use std::future::Future;
use std::sync::Arc;

use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel, TransactionTrait,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::tracker::{ChangeTracker, StagedChange};
use common::{AppError, AppResult};

/// Connection a statement should run on.
///
/// Reads and flushes go through the open transaction when there is one so
/// they observe the transaction's own writes.
#[derive(Clone, Copy)]
pub enum Executor<'a> {
    Connection(&'a DatabaseConnection),
    Transaction(&'a DatabaseTransaction),
}

/// Run `$body` with `$conn` bound to the concrete connection type behind an [`Executor`].
macro_rules! dispatch {
    ($executor:expr, |$conn:ident| $body:expr) => {
        match $executor {
            $crate::context::Executor::Connection($conn) => $body,
            $crate::context::Executor::Transaction($conn) => $body,
        }
    };
}

pub(crate) use dispatch;

/// Holds the transaction slot locked while a statement runs.
pub struct ExecutorGuard<'a> {
    db: &'a DatabaseConnection,
    slot: MutexGuard<'a, Option<DatabaseTransaction>>,
}

impl ExecutorGuard<'_> {
    pub fn executor(&self) -> Executor<'_> {
        match self.slot.as_ref() {
            Some(txn) => Executor::Transaction(txn),
            None => Executor::Connection(self.db),
        }
    }
}

/// Connection, open transaction and staged changes for one unit of work.
pub struct PersistenceContext {
    db: DatabaseConnection,
    transaction: Mutex<Option<DatabaseTransaction>>,
    tracker: ChangeTracker,
}

impl PersistenceContext {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            transaction: Mutex::new(None),
            tracker: ChangeTracker::default(),
        }
    }

    /// Get a reference to the database connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub(crate) fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Lock the transaction slot and hand out the executor for it.
    pub async fn executor(&self) -> ExecutorGuard<'_> {
        ExecutorGuard {
            db: &self.db,
            slot: self.transaction.lock().await,
        }
    }

    pub async fn has_active_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    pub(crate) async fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> AppResult<()> {
        let mut slot = self.transaction.lock().await;
        if slot.is_some() {
            return Err(AppError::invalid_state("Transaction already exists"));
        }

        let txn = match isolation {
            Some(level) => self.db.begin_with_config(Some(level), None).await?,
            None => self.db.begin().await?,
        };
        *slot = Some(txn);

        tracing::debug!(?isolation, "Transaction started");
        Ok(())
    }

    /// Commit the open transaction, if any. The slot is cleared before the
    /// commit is attempted.
    pub(crate) async fn commit_transaction(&self) -> AppResult<bool> {
        let txn = self.transaction.lock().await.take();
        match txn {
            Some(txn) => {
                txn.commit().await?;
                tracing::debug!("Transaction committed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Roll back the open transaction, if any. The slot is cleared even when
    /// the rollback itself fails.
    pub(crate) async fn rollback_transaction(&self) -> AppResult<bool> {
        let txn = self.transaction.lock().await.take();
        match txn {
            Some(txn) => {
                txn.rollback().await?;
                tracing::debug!("Transaction rolled back");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flush every staged change and return the number of affected rows.
    ///
    /// The batch is atomic: it runs in a savepoint of the open transaction,
    /// or in an implicit transaction when none is open. Flushed changes leave
    /// the queue only after the whole batch succeeded.
    pub(crate) async fn save_changes(&self) -> AppResult<u64> {
        let pending = self.tracker.snapshot();
        if pending.is_empty() {
            return Ok(0);
        }

        let slot = self.transaction.lock().await;
        let affected = match slot.as_ref() {
            Some(txn) => apply_atomically(&pending, txn).await?,
            None => apply_atomically(&pending, &self.db).await?,
        };
        drop(slot);

        for change in &pending {
            change.publish();
        }
        self.tracker.acknowledge(pending.len());
        tracing::debug!(changes = pending.len(), affected, "Staged changes flushed");
        Ok(affected)
    }
}

impl Drop for PersistenceContext {
    fn drop(&mut self) {
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::warn!(pending, "Persistence context dropped with unsaved changes");
        }
        if self.transaction.get_mut().is_some() {
            tracing::warn!("Persistence context dropped with an open transaction, rolling back");
        }
    }
}

/// Apply `pending` in a transaction nested in `conn`: a savepoint when `conn`
/// is itself a transaction.
async fn apply_atomically<C: TransactionTrait>(
    pending: &[Arc<dyn StagedChange>],
    conn: &C,
) -> Result<u64, DbErr> {
    let txn = conn.begin().await?;
    match apply_all(pending, &txn).await {
        Ok(affected) => {
            txn.commit().await?;
            Ok(affected)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Flush rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn apply_all(
    pending: &[Arc<dyn StagedChange>],
    txn: &DatabaseTransaction,
) -> Result<u64, DbErr> {
    let mut affected = 0;
    for change in pending {
        tracing::debug!(kind = ?change.kind(), table = %change.table(), "Applying staged change");
        affected += change.apply(txn).await?;
    }
    Ok(affected)
}

/// Race `operation` against the cancellation token, if one was given.
pub(crate) async fn cancellable<T, F>(cancel: Option<&CancellationToken>, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(AppError::Cancelled),
            result = operation => result,
        },
        None => operation.await,
    }
}

pub(crate) fn ensure_not_cancelled(cancel: Option<&CancellationToken>) -> AppResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(AppError::Cancelled),
        _ => Ok(()),
    }
}
