//! Relation loaders backing `ReadSpecification::add_include`.

use std::any::TypeId;
use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{DbErr, EntityTrait, LoaderTrait, Related, RelationType};

use crate::context::{dispatch, Executor};
use crate::record::RelatedRows;

/// Loads one relation for a batch of rows.
#[async_trait]
pub(crate) trait Include<E: EntityTrait>: Send + Sync {
    /// Key the loaded rows are stored under in each record.
    fn key(&self) -> TypeId;

    /// Related table, for logging.
    fn table(&self) -> String;

    /// Related rows per input row, in input order.
    async fn load(
        &self,
        models: &[E::Model],
        executor: Executor<'_>,
    ) -> Result<Vec<RelatedRows>, DbErr>;
}

/// Include for a direct relation `E -> R`.
///
/// To-one relations (`belongs_to`, `has_one`) go through `load_one`,
/// `has_many` through `load_many`; either way each row gets a `Vec`.
pub(crate) struct RelationInclude<R> {
    _related: PhantomData<fn() -> R>,
}

impl<R> RelationInclude<R> {
    pub fn new() -> Self {
        Self {
            _related: PhantomData,
        }
    }
}

#[async_trait]
impl<E, R> Include<E> for RelationInclude<R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: EntityTrait + 'static,
    R::Model: Send + Sync + 'static,
{
    fn key(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn table(&self) -> String {
        R::default().table_name().to_string()
    }

    async fn load(
        &self,
        models: &[E::Model],
        executor: Executor<'_>,
    ) -> Result<Vec<RelatedRows>, DbErr> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Vec<R::Model>> = match <E as Related<R>>::to().rel_type {
            RelationType::HasOne => {
                dispatch!(executor, |conn| models.load_one(R::default(), conn).await)?
                    .into_iter()
                    .map(|row| row.into_iter().collect())
                    .collect()
            }
            RelationType::HasMany => {
                dispatch!(executor, |conn| models.load_many(R::default(), conn).await)?
            }
        };

        Ok(rows
            .into_iter()
            .map(|related| Box::new(related) as RelatedRows)
            .collect())
    }
}
