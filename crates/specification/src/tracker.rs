//! Staged-change queue.
//!
//! Mutation repositories only record intent here; nothing reaches the
//! database until the unit of work flushes.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseTransaction, DbErr, EntityName, EntityTrait,
    IntoActiveModel,
};

/// Model type behind an active model.
pub type ModelOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Model;

/// What a flush does with a staged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Active models that can be staged and later written by a flush.
///
/// Implemented for every sea-orm `ActiveModel` whose model converts back
/// into it, which is what `DeriveEntityModel` generates.
#[async_trait]
pub trait Persistable: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static {
    /// Table the entity lives in, for logging.
    fn table_name() -> String;

    /// Execute the change and return the number of affected rows, plus the
    /// row as the database stored it for inserts and updates.
    ///
    /// Updates write every attribute that carries a value, so a model
    /// converted with `into_active_model()` is written in full.
    async fn persist(
        self,
        kind: ChangeKind,
        txn: &DatabaseTransaction,
    ) -> Result<(u64, Option<ModelOf<Self>>), DbErr>;
}

#[async_trait]
impl<A> Persistable for A
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    fn table_name() -> String {
        A::Entity::default().table_name().to_string()
    }

    async fn persist(
        self,
        kind: ChangeKind,
        txn: &DatabaseTransaction,
    ) -> Result<(u64, Option<ModelOf<Self>>), DbErr> {
        match kind {
            ChangeKind::Insert => Ok((1, Some(self.insert(txn).await?))),
            ChangeKind::Update => Ok((1, Some(self.reset_all().update(txn).await?))),
            ChangeKind::Delete => Ok((self.delete(txn).await?.rows_affected, None)),
        }
    }
}

/// An entity staged by `add`.
///
/// Dereferences to the staged active model, unchanged. Once a flush that
/// included it succeeds, [`Added::model`] holds the inserted row with
/// database-generated values such as auto-increment keys. The row is durable
/// when the surrounding transaction commits.
pub struct Added<A: Persistable> {
    entity: A,
    written: Arc<Mutex<Option<ModelOf<A>>>>,
}

impl<A: Persistable> Added<A> {
    pub fn entity(&self) -> &A {
        &self.entity
    }

    pub fn into_entity(self) -> A {
        self.entity
    }

    /// Inserted row, or `None` until a flush succeeded.
    pub fn model(&self) -> Option<ModelOf<A>> {
        lock(&self.written).clone()
    }

    pub fn is_saved(&self) -> bool {
        lock(&self.written).is_some()
    }
}

impl<A: Persistable> Deref for Added<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.entity
    }
}

impl<A: Persistable> fmt::Debug for Added<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Added")
            .field("entity", &self.entity)
            .field("saved", &self.is_saved())
            .finish()
    }
}

/// Type-erased staged change.
#[async_trait]
pub(crate) trait StagedChange: Send + Sync {
    fn kind(&self) -> ChangeKind;

    fn table(&self) -> String;

    /// Write the change. The stored row is held back until [`publish`](Self::publish).
    async fn apply(&self, txn: &DatabaseTransaction) -> Result<u64, DbErr>;

    /// Expose the row written by the last `apply` once its batch succeeded.
    fn publish(&self);
}

struct Staged<A: Persistable> {
    kind: ChangeKind,
    model: A,
    // Written by `apply`, overwritten on retry
    flushed: Mutex<Option<ModelOf<A>>>,
    written: Arc<Mutex<Option<ModelOf<A>>>>,
}

impl<A: Persistable> Staged<A> {
    fn new(kind: ChangeKind, model: A) -> Self {
        Self {
            kind,
            model,
            flushed: Mutex::new(None),
            written: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl<A: Persistable> StagedChange for Staged<A> {
    fn kind(&self) -> ChangeKind {
        self.kind
    }

    fn table(&self) -> String {
        A::table_name()
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<u64, DbErr> {
        let (affected, stored) = self.model.clone().persist(self.kind, txn).await?;
        *lock(&self.flushed) = stored;
        Ok(affected)
    }

    fn publish(&self) {
        if let Some(stored) = lock(&self.flushed).take() {
            *lock(&self.written) = Some(stored);
        }
    }
}

/// Ordered queue of staged changes.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    pending: Mutex<Vec<Arc<dyn StagedChange>>>,
}

impl ChangeTracker {
    pub fn stage<A: Persistable>(&self, kind: ChangeKind, model: A) {
        tracing::debug!(?kind, table = %A::table_name(), "Change staged");
        lock(&self.pending).push(Arc::new(Staged::new(kind, model)));
    }

    pub fn stage_range<A: Persistable>(&self, kind: ChangeKind, models: impl IntoIterator<Item = A>) {
        let staged: Vec<Arc<dyn StagedChange>> = models
            .into_iter()
            .map(|model| Arc::new(Staged::new(kind, model)) as Arc<dyn StagedChange>)
            .collect();
        tracing::debug!(?kind, table = %A::table_name(), count = staged.len(), "Changes staged");
        lock(&self.pending).extend(staged);
    }

    /// Stage an insert and hand back a handle that sees the flushed row.
    pub fn stage_insert<A: Persistable>(&self, model: A) -> Added<A> {
        tracing::debug!(table = %A::table_name(), "Insert staged");
        let (added, change) = insert_change(model);
        lock(&self.pending).push(change);
        added
    }

    pub fn stage_inserts<A: Persistable>(&self, models: impl IntoIterator<Item = A>) -> Vec<Added<A>> {
        let (added, staged): (Vec<_>, Vec<_>) = models.into_iter().map(insert_change).unzip();
        tracing::debug!(table = %A::table_name(), count = staged.len(), "Inserts staged");
        lock(&self.pending).extend(staged);
        added
    }

    /// Copy of the queue in staging order.
    pub fn snapshot(&self) -> Vec<Arc<dyn StagedChange>> {
        lock(&self.pending).clone()
    }

    /// Remove the first `count` changes after they were flushed.
    pub fn acknowledge(&self, count: usize) {
        let mut pending = lock(&self.pending);
        let count = count.min(pending.len());
        pending.drain(..count);
    }

    /// Drop every staged change and return how many there were.
    pub fn clear(&self) -> usize {
        let mut pending = lock(&self.pending);
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }
}

fn insert_change<A: Persistable>(model: A) -> (Added<A>, Arc<dyn StagedChange>) {
    let change = Staged::new(ChangeKind::Insert, model.clone());
    let added = Added {
        entity: model,
        written: change.written.clone(),
    };
    (added, Arc::new(change))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
