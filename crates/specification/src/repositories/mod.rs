//! Repository layer - Data access abstraction
//!
//! One repository kind per capability, each generic over the entity and
//! bound to the unit of work's shared persistence context.

mod base;
mod create;
mod delete;
mod read;
mod update;

pub use base::{CreateRepository, DeleteRepository, ReadRepository, UpdateRepository};
pub use create::CreateRepositoryBase;
pub use delete::DeleteRepositoryBase;
pub use read::ReadRepositoryBase;
pub use update::UpdateRepositoryBase;
