//! Delete staging.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::base::DeleteRepository;
use crate::context::{ensure_not_cancelled, PersistenceContext};
use crate::tracker::{ChangeKind, Persistable};
use common::AppResult;

/// Delete repository over one entity table of the shared context
pub struct DeleteRepositoryBase<A> {
    context: Arc<PersistenceContext>,
    _entity: PhantomData<fn() -> A>,
}

impl<A> DeleteRepositoryBase<A> {
    pub fn new(context: Arc<PersistenceContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Persistable> DeleteRepository<A> for DeleteRepositoryBase<A> {
    async fn delete(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<()> {
        ensure_not_cancelled(cancel)?;
        self.context.tracker().stage(ChangeKind::Delete, entity);
        Ok(())
    }

    async fn delete_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<()> {
        ensure_not_cancelled(cancel)?;
        self.context.tracker().stage_range(ChangeKind::Delete, entities);
        Ok(())
    }
}
