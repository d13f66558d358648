//! Repository traits following Interface Segregation Principle (ISP).
//!
//! Reads, creates, updates and deletes are separate traits so consumers can
//! depend on just the capability they use. Mutation traits only stage
//! changes; the unit of work decides when they are flushed.

use async_trait::async_trait;
use sea_orm::{EntityTrait, PrimaryKeyTrait, Value};
use tokio_util::sync::CancellationToken;

use crate::record::Record;
use crate::specification::ReadSpecification;
use crate::tracker::{Added, Persistable};
use common::AppResult;

/// Read operations (Query) - Single Responsibility
#[async_trait]
pub trait ReadRepository<E>: Send + Sync
where
    E: EntityTrait,
    E::Model: Sync,
{
    /// Rows matching the specification: filter, then order, then paging,
    /// then the included relations.
    async fn get(
        &self,
        specification: &ReadSpecification<E>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<Record<E::Model>>>;

    /// Every row of the table
    async fn get_all(&self, cancel: Option<&CancellationToken>) -> AppResult<Vec<E::Model>>;

    /// Find entity by primary key; a missing row is `None`
    async fn get_by_id(
        &self,
        id: <E::PrimaryKey as PrimaryKeyTrait>::ValueType,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Option<E::Model>>;

    /// Run caller-supplied SQL with positional parameters.
    ///
    /// The statement must select the entity's columns. The text is passed
    /// through untouched: keeping user input out of it is the caller's job,
    /// values belong in `values`.
    async fn get_by_query(
        &self,
        sql: &str,
        values: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<E::Model>>;

    /// Number of rows matching the specification's filter
    async fn count(
        &self,
        specification: &ReadSpecification<E>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<u64>;
}

/// Insert operations (Command) - Single Responsibility
#[async_trait]
pub trait CreateRepository<A: Persistable>: Send + Sync {
    /// Stage an entity for insertion.
    ///
    /// The handle dereferences to the entity unchanged; generated values
    /// such as keys appear on [`Added::model`] after a successful flush.
    async fn add(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<Added<A>>;

    /// Stage several entities for insertion
    async fn add_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<Added<A>>>;

    /// Next value of a database sequence.
    ///
    /// Useful when a key must be known before the insert is flushed.
    async fn get_sequence(&self, name: &str) -> AppResult<i64>;
}

/// Update operations (Command) - Single Responsibility
#[async_trait]
pub trait UpdateRepository<A: Persistable>: Send + Sync {
    /// Stage an entity as modified
    async fn update(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<()>;

    /// Stage several entities as modified
    async fn update_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<()>;
}

/// Delete operations - Single Responsibility
#[async_trait]
pub trait DeleteRepository<A: Persistable>: Send + Sync {
    /// Stage an entity for removal by primary key
    async fn delete(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<()>;

    /// Stage several entities for removal
    async fn delete_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<()>;
}
