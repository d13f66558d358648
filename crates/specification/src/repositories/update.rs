//! Update staging.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::base::UpdateRepository;
use crate::context::{ensure_not_cancelled, PersistenceContext};
use crate::tracker::{ChangeKind, Persistable};
use common::AppResult;

/// Update repository over one entity table of the shared context
pub struct UpdateRepositoryBase<A> {
    context: Arc<PersistenceContext>,
    _entity: PhantomData<fn() -> A>,
}

impl<A> UpdateRepositoryBase<A> {
    pub fn new(context: Arc<PersistenceContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Persistable> UpdateRepository<A> for UpdateRepositoryBase<A> {
    async fn update(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<()> {
        ensure_not_cancelled(cancel)?;
        self.context.tracker().stage(ChangeKind::Update, entity);
        Ok(())
    }

    async fn update_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<()> {
        ensure_not_cancelled(cancel)?;
        self.context.tracker().stage_range(ChangeKind::Update, entities);
        Ok(())
    }
}
