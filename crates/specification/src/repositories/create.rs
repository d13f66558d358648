//! Insert staging and sequence retrieval.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use tokio_util::sync::CancellationToken;

use super::base::CreateRepository;
use crate::context::{dispatch, ensure_not_cancelled, PersistenceContext};
use crate::tracker::{Added, Persistable};
use common::{AppError, AppResult};

/// Plain identifier, optionally schema-qualified (`schema.sequence`).
static SEQUENCE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("sequence name pattern is valid")
});

/// Column the sequence statements alias their value to
const SEQUENCE_VALUE_COLUMN: &str = "value";

/// Create repository over one entity table of the shared context
pub struct CreateRepositoryBase<A> {
    context: Arc<PersistenceContext>,
    _entity: PhantomData<fn() -> A>,
}

impl<A> CreateRepositoryBase<A> {
    pub fn new(context: Arc<PersistenceContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<A: Persistable> CreateRepository<A> for CreateRepositoryBase<A> {
    async fn add(&self, entity: A, cancel: Option<&CancellationToken>) -> AppResult<Added<A>> {
        ensure_not_cancelled(cancel)?;
        Ok(self.context.tracker().stage_insert(entity))
    }

    async fn add_range(
        &self,
        entities: Vec<A>,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<Vec<Added<A>>> {
        ensure_not_cancelled(cancel)?;
        Ok(self.context.tracker().stage_inserts(entities))
    }

    async fn get_sequence(&self, name: &str) -> AppResult<i64> {
        if name.trim().is_empty() {
            return Err(AppError::invalid_argument(
                "Sequence name cannot be null or empty",
            ));
        }
        if !SEQUENCE_NAME.is_match(name) {
            return Err(AppError::invalid_argument(format!(
                "Invalid sequence name '{}'",
                name
            )));
        }

        let guard = self.context.executor().await;
        let value = dispatch!(guard.executor(), |conn| next_value(conn, name).await)
            .map_err(|source| AppError::sequence(name, source))?;

        tracing::debug!(sequence = name, value, "Sequence value retrieved");
        Ok(value)
    }
}

/// Fetch the next value of `name` using the backend's sequence syntax.
async fn next_value<C: ConnectionTrait>(conn: &C, name: &str) -> Result<i64, DbErr> {
    let statement = sequence_statement(conn.get_database_backend(), name)?;

    let row = conn
        .query_one(statement)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("sequence '{}' returned no row", name)))?;

    row.try_get::<i64>("", SEQUENCE_VALUE_COLUMN)
}

/// Statement selecting the next value of `name` as [`SEQUENCE_VALUE_COLUMN`].
fn sequence_statement(backend: DbBackend, name: &str) -> Result<Statement, DbErr> {
    match backend {
        DbBackend::Postgres => Ok(Statement::from_sql_and_values(
            backend,
            format!("SELECT nextval($1::regclass) AS {}", SEQUENCE_VALUE_COLUMN),
            [name.into()],
        )),
        // MariaDB sequences; `name` has already been checked to be an identifier
        DbBackend::MySql => Ok(Statement::from_string(
            backend,
            format!("SELECT NEXT VALUE FOR {} AS {}", name, SEQUENCE_VALUE_COLUMN),
        )),
        _ => Err(DbErr::Custom(format!(
            "{:?} does not support sequences",
            backend
        ))),
    }
}
