//! Materialized rows with their eager-loaded relations.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

use sea_orm::EntityTrait;

/// Related rows loaded for one row, boxed by related entity type.
pub(crate) type RelatedRows = Box<dyn Any + Send + Sync>;

/// A row returned by [`ReadRepository::get`](crate::ReadRepository::get).
///
/// Dereferences to the model. Relations named in the specification's
/// includes are available through [`Record::related`]; every other relation
/// stays unloaded.
pub struct Record<M> {
    model: M,
    related: HashMap<TypeId, RelatedRows>,
}

impl<M> Record<M> {
    pub(crate) fn new(model: M) -> Self {
        Self {
            model,
            related: HashMap::new(),
        }
    }

    pub(crate) fn attach(&mut self, key: TypeId, rows: RelatedRows) {
        self.related.insert(key, rows);
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Rows of `R` loaded for this record, or `None` if `R` was not included.
    ///
    /// A to-one relation yields zero or one row.
    pub fn related<R>(&self) -> Option<&[R::Model]>
    where
        R: EntityTrait + 'static,
        R::Model: 'static,
    {
        self.related
            .get(&TypeId::of::<R>())
            .and_then(|rows| rows.downcast_ref::<Vec<R::Model>>())
            .map(Vec::as_slice)
    }

    /// Whether the relation to `R` was eager-loaded.
    pub fn is_loaded<R: EntityTrait + 'static>(&self) -> bool {
        self.related.contains_key(&TypeId::of::<R>())
    }
}

impl<M> Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: fmt::Debug> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model)
            .field("loaded_relations", &self.related.len())
            .finish()
    }
}
