//! Specification-driven read repository.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, EntityTrait, PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Statement, Value,
};
use tokio_util::sync::CancellationToken;

use super::base::ReadRepository;
use crate::context::{cancellable, dispatch, PersistenceContext};
use crate::record::Record;
use crate::specification::ReadSpecification;
use common::{AppError, AppResult};

/// Read repository over one entity table of the shared context
pub struct ReadRepositoryBase<E> {
    context: Arc<PersistenceContext>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> ReadRepositoryBase<E> {
    pub fn new(context: Arc<PersistenceContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

/// Build the select for a specification: filter, primary order, secondary
/// orders, then the paging window.
pub(crate) fn compose<E: EntityTrait>(specification: &ReadSpecification<E>) -> Select<E> {
    let mut query = E::find();

    if let Some(condition) = specification.filter() {
        query = query.filter(condition.clone());
    }

    if let Some((column, order)) = specification.primary_order() {
        query = query.order_by(*column, order.clone());
        for (column, order) in specification.then_order_by() {
            query = query.order_by(*column, order.clone());
        }
    }

    if specification.is_paging_enabled() {
        query = query.limit(specification.take()).offset(specification.skip());
    }

    query
}

#[async_trait]
impl<E> ReadRepository<E> for ReadRepositoryBase<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    async fn get(
        &self,
        specification: &ReadSpecification<E>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<Record<E::Model>>> {
        cancellable(cancel, async {
            let guard = self.context.executor().await;
            let executor = guard.executor();

            let query = compose(specification);
            let models = dispatch!(executor, |conn| query.all(conn).await)?;

            let mut loaded = Vec::with_capacity(specification.include_count());
            for include in specification.includes() {
                let rows = include.load(&models, executor).await?;
                loaded.push((include.key(), rows));
            }

            let mut records: Vec<Record<E::Model>> = models.into_iter().map(Record::new).collect();
            for (key, rows) in loaded {
                for (record, related) in records.iter_mut().zip(rows) {
                    record.attach(key, related);
                }
            }

            tracing::debug!(
                rows = records.len(),
                includes = specification.include_count(),
                "Specification query executed"
            );
            Ok(records)
        })
        .await
    }

    async fn get_all(&self, cancel: Option<&CancellationToken>) -> AppResult<Vec<E::Model>> {
        cancellable(cancel, async {
            let guard = self.context.executor().await;
            let models = dispatch!(guard.executor(), |conn| E::find().all(conn).await)?;
            Ok(models)
        })
        .await
    }

    async fn get_by_id(
        &self,
        id: <E::PrimaryKey as PrimaryKeyTrait>::ValueType,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Option<E::Model>> {
        cancellable(cancel, async {
            let guard = self.context.executor().await;
            let model = dispatch!(guard.executor(), |conn| E::find_by_id(id).one(conn).await)?;
            Ok(model)
        })
        .await
    }

    async fn get_by_query(
        &self,
        sql: &str,
        values: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<E::Model>> {
        if sql.trim().is_empty() {
            return Err(AppError::invalid_argument("Raw query text cannot be empty"));
        }

        cancellable(cancel, async {
            let guard = self.context.executor().await;
            let models = dispatch!(guard.executor(), |conn| {
                let statement =
                    Statement::from_sql_and_values(conn.get_database_backend(), sql, values);
                E::find().from_raw_sql(statement).all(conn).await
            })?;
            Ok(models)
        })
        .await
    }

    async fn count(
        &self,
        specification: &ReadSpecification<E>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<u64> {
        cancellable(cancel, async {
            let guard = self.context.executor().await;
            let mut query = E::find();
            if let Some(condition) = specification.filter() {
                query = query.filter(condition.clone());
            }
            let total = dispatch!(guard.executor(), |conn| query.count(conn).await)?;
            Ok(total)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{ColumnTrait, Condition, DbBackend, QueryTrait};

    use super::compose;
    use crate::fixtures::author;
    use crate::specification::ReadSpecification;

    fn sql(spec: &ReadSpecification<author::Entity>) -> String {
        compose(spec).build(DbBackend::Sqlite).to_string()
    }

    #[test]
    fn test_compose_orders_clauses() {
        let spec = ReadSpecification::<author::Entity>::new()
            .add_filter(Condition::all().add(author::Column::Name.like("A%")))
            .add_order_by_descending(author::Column::Name)
            .add_then_order_by(author::Column::Id)
            .apply_paging(10, 20);

        let sql = sql(&spec);
        let filter_at = sql.find("WHERE").unwrap();
        let order_at = sql.find("ORDER BY").unwrap();
        let limit_at = sql.find("LIMIT").unwrap();

        assert!(filter_at < order_at && order_at < limit_at);
        assert!(sql.contains(r#"ORDER BY "authors"."name" DESC, "authors"."id" ASC"#));
        assert!(sql.contains("OFFSET"));
    }

    #[test]
    fn test_compose_without_criteria_selects_everything() {
        let sql = sql(&ReadSpecification::new());

        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("ORDER BY"));
        assert!(!sql.contains("LIMIT"));
    }
}
