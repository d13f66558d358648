//! Unit of Work pattern implementation.
//!
//! The Unit of Work:
//! - Hands out repositories bound to one shared persistence context
//! - Manages the transaction lifecycle (begin, commit, rollback)
//! - Flushes staged inserts, updates and deletes in staging order
//!
//! Transaction handle states: none → active (`begin_transaction`) →
//! none again after `commit` or `roll_back`. Only one transaction can be
//! active at a time.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sea_orm::{DatabaseConnection, EntityTrait, IsolationLevel};
use tokio_util::sync::CancellationToken;

use crate::context::{cancellable, PersistenceContext};
use crate::repositories::{
    CreateRepositoryBase, DeleteRepositoryBase, ReadRepositoryBase, UpdateRepositoryBase,
};
use crate::tracker::Persistable;
use common::AppResult;

/// Unit of Work trait for dependency injection.
///
/// Repository factories build a fresh repository on every call; they are
/// cheap handles onto the shared context.
/// Note: This trait is not object safe due to generic methods.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Get a read repository for `E`
    fn read_repository<E>(&self) -> ReadRepositoryBase<E>
    where
        E: EntityTrait,
        E::Model: Sync;

    /// Get a create repository for `A`
    fn create_repository<A: Persistable>(&self) -> CreateRepositoryBase<A>;

    /// Get an update repository for `A`
    fn update_repository<A: Persistable>(&self) -> UpdateRepositoryBase<A>;

    /// Get a delete repository for `A`
    fn delete_repository<A: Persistable>(&self) -> DeleteRepositoryBase<A>;

    /// Open a transaction. Fails with an invalid-state error if one is already open.
    async fn begin_transaction(&self, cancel: Option<&CancellationToken>) -> AppResult<()>;

    /// Flush staged changes, then commit the open transaction if there is one.
    ///
    /// Any failure, cancellation included, rolls back before the original
    /// error is returned.
    async fn commit(&self, cancel: Option<&CancellationToken>) -> AppResult<()>;

    /// Roll back the open transaction if there is one. The handle is
    /// released even when the rollback fails.
    async fn roll_back(&self) -> AppResult<()>;

    /// Flush staged changes without touching transaction boundaries.
    ///
    /// Returns the number of affected rows.
    async fn save_changes(&self, cancel: Option<&CancellationToken>) -> AppResult<u64>;
}

/// Concrete implementation of UnitOfWork over a sea-orm connection
pub struct DbUnitOfWork {
    context: Arc<PersistenceContext>,
}

impl DbUnitOfWork {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            context: Arc::new(PersistenceContext::new(db)),
        }
    }

    /// Shared context the repositories are bound to
    pub fn context(&self) -> &Arc<PersistenceContext> {
        &self.context
    }

    /// Open a transaction with an explicit isolation level.
    pub async fn begin_transaction_with_isolation(
        &self,
        isolation: IsolationLevel,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<()> {
        cancellable(cancel, self.context.begin_transaction(Some(isolation))).await?;
        tracing::info!(?isolation, "Transaction started");
        Ok(())
    }

    pub async fn has_active_transaction(&self) -> bool {
        self.context.has_active_transaction().await
    }

    /// Number of staged changes waiting for a flush
    pub fn pending_changes(&self) -> usize {
        self.context.tracker().len()
    }

    /// Drop every staged change without flushing. Returns how many were dropped.
    pub fn discard_changes(&self) -> usize {
        let discarded = self.context.tracker().clear();
        if discarded > 0 {
            tracing::info!(discarded, "Staged changes discarded");
        }
        discarded
    }

    /// Execute a closure within a transaction.
    ///
    /// Staged changes are committed on success. On error the transaction is
    /// rolled back, staged changes are discarded and the closure's error is
    /// returned.
    pub async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> BoxFuture<'a, AppResult<T>> + Send,
        T: Send,
    {
        self.begin_transaction(None).await?;

        match f(self).await {
            Ok(result) => {
                self.commit(None).await?;
                Ok(result)
            }
            Err(e) => {
                self.discard_changes();
                if let Err(rollback_err) = self.roll_back().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Release the unit of work: roll back any open transaction and drop
    /// staged changes.
    pub async fn close(self) -> AppResult<()> {
        self.discard_changes();
        self.roll_back().await
    }
}

#[async_trait]
impl UnitOfWork for DbUnitOfWork {
    fn read_repository<E>(&self) -> ReadRepositoryBase<E>
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        ReadRepositoryBase::new(self.context.clone())
    }

    fn create_repository<A: Persistable>(&self) -> CreateRepositoryBase<A> {
        CreateRepositoryBase::new(self.context.clone())
    }

    fn update_repository<A: Persistable>(&self) -> UpdateRepositoryBase<A> {
        UpdateRepositoryBase::new(self.context.clone())
    }

    fn delete_repository<A: Persistable>(&self) -> DeleteRepositoryBase<A> {
        DeleteRepositoryBase::new(self.context.clone())
    }

    async fn begin_transaction(&self, cancel: Option<&CancellationToken>) -> AppResult<()> {
        cancellable(cancel, self.context.begin_transaction(None)).await?;
        tracing::info!("Transaction started");
        Ok(())
    }

    async fn commit(&self, cancel: Option<&CancellationToken>) -> AppResult<()> {
        let outcome = cancellable(cancel, async {
            let affected = self.context.save_changes().await?;
            let committed = self.context.commit_transaction().await?;
            Ok((affected, committed))
        })
        .await;

        match outcome {
            Ok((affected, committed)) => {
                tracing::info!(affected, committed, "Unit of work committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(code = e.code(), "Commit failed, rolling back: {}", e);
                if let Err(rollback_err) = self.roll_back().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn roll_back(&self) -> AppResult<()> {
        if self.context.rollback_transaction().await? {
            tracing::info!("Transaction rolled back");
        }
        Ok(())
    }

    async fn save_changes(&self, cancel: Option<&CancellationToken>) -> AppResult<u64> {
        cancellable(cancel, self.context.save_changes()).await
    }
}

/// Shorthand for [`DbUnitOfWork::transaction`].
///
/// `$ctx` is bound to the `&DbUnitOfWork` the closure receives, and `$body`
/// runs as the body of the boxed async block. Its value is the closure's
/// `AppResult`, usually needing a type hint such as `Ok::<_, AppError>(..)`.
///
/// ```ignore
/// let staged = with_transaction!(uow, |ctx| {
///     ctx.create_repository::<order::ActiveModel>().add(order, None).await?;
///     Ok::<_, AppError>(ctx.pending_changes())
/// })?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| ::std::boxed::Box::pin(async move { $body }))
            .await
    };
}
