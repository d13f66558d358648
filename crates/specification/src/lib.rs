//! Specification Library
//!
//! Generic data access over sea-orm:
//! - [`ReadSpecification`]: declarative filter, ordering, paging and eager-load criteria
//! - Repositories split by capability (read, create, update, delete)
//! - [`DbUnitOfWork`]: one shared context, staged changes and explicit transactions
//!
//! Mutating repositories only stage changes. Nothing is written until the
//! unit of work saves or commits.

pub mod context;
pub mod db;
pub mod record;
pub mod repositories;
pub mod specification;
pub mod tracker;
pub mod unit_of_work;

#[cfg(test)]
mod fixtures;

pub use context::{Executor, ExecutorGuard, PersistenceContext};
pub use db::Database;
pub use record::Record;
pub use repositories::{
    CreateRepository, CreateRepositoryBase, DeleteRepository, DeleteRepositoryBase,
    ReadRepository, ReadRepositoryBase, UpdateRepository, UpdateRepositoryBase,
};
pub use specification::ReadSpecification;
pub use tracker::{Added, ChangeKind, ModelOf, Persistable};
pub use unit_of_work::{DbUnitOfWork, UnitOfWork};

pub use common::{AppError, AppResult};
pub use tokio_util::sync::CancellationToken;
