//! Declarative read queries.
//!
//! A [`ReadSpecification`] describes what a read should return: a filter
//! condition, a primary order with optional secondary keys, a paging window
//! and the relations to eager-load. It is a plain value, built fluently and
//! cloned freely, so reusable query shapes are ordinary functions:
//!
//! ```ignore
//! fn active_customers_newest_first() -> ReadSpecification<customer::Entity> {
//!     ReadSpecification::new()
//!         .add_filter(Condition::all().add(customer::Column::Active.eq(true)))
//!         .add_order_by_descending(customer::Column::CreatedAt)
//!         .add_include::<order::Entity>()
//! }
//! ```

mod include;

use std::fmt;
use std::sync::Arc;

use sea_orm::{Condition, EntityTrait, Order, Related};

pub(crate) use include::Include;
use include::RelationInclude;

/// Filter, ordering, paging and include criteria for one entity type.
pub struct ReadSpecification<E: EntityTrait> {
    filter: Option<Condition>,
    includes: Vec<Arc<dyn Include<E>>>,
    order: Option<(E::Column, Order)>,
    then_order: Vec<(E::Column, Order)>,
    take: u64,
    skip: u64,
    paging_enabled: bool,
}

impl<E: EntityTrait> ReadSpecification<E> {
    pub fn new() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            order: None,
            then_order: Vec::new(),
            take: 0,
            skip: 0,
            paging_enabled: false,
        }
    }

    /// Set the filter condition, replacing any previous one.
    pub fn add_filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Eager-load the rows of `R` related to each result.
    pub fn add_include<R>(mut self) -> Self
    where
        E: Related<R>,
        E::Model: Sync,
        R: EntityTrait + 'static,
        R::Model: Send + Sync + 'static,
    {
        self.includes.push(Arc::new(RelationInclude::<R>::new()));
        self
    }

    /// Order ascending by `column`. Replaces any primary order.
    pub fn add_order_by(mut self, column: E::Column) -> Self {
        self.order = Some((column, Order::Asc));
        self
    }

    /// Order descending by `column`. Replaces any primary order.
    pub fn add_order_by_descending(mut self, column: E::Column) -> Self {
        self.order = Some((column, Order::Desc));
        self
    }

    /// Secondary ascending key. Ignored unless a primary order is set.
    pub fn add_then_order_by(self, column: E::Column) -> Self {
        self.push_then_order(column, Order::Asc)
    }

    /// Secondary descending key. Ignored unless a primary order is set.
    pub fn add_then_order_by_descending(self, column: E::Column) -> Self {
        self.push_then_order(column, Order::Desc)
    }

    /// Enable paging: return at most `take` rows after skipping `skip`.
    pub fn apply_paging(mut self, take: u64, skip: u64) -> Self {
        self.take = take;
        self.skip = skip;
        self.paging_enabled = true;
        self
    }

    fn push_then_order(mut self, column: E::Column, order: Order) -> Self {
        if self.order.is_some() {
            self.then_order.push((column, order));
        } else {
            tracing::debug!(?column, "Secondary order ignored without a primary order");
        }
        self
    }

    pub fn filter(&self) -> Option<&Condition> {
        self.filter.as_ref()
    }

    /// Primary order as column and direction.
    pub fn primary_order(&self) -> Option<&(E::Column, Order)> {
        self.order.as_ref()
    }

    /// Primary order column when it is ascending.
    pub fn order_by(&self) -> Option<&E::Column> {
        match &self.order {
            Some((column, Order::Asc)) => Some(column),
            _ => None,
        }
    }

    /// Primary order column when it is descending.
    pub fn order_by_descending(&self) -> Option<&E::Column> {
        match &self.order {
            Some((column, Order::Desc)) => Some(column),
            _ => None,
        }
    }

    pub fn then_order_by(&self) -> &[(E::Column, Order)] {
        &self.then_order
    }

    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    pub(crate) fn includes(&self) -> &[Arc<dyn Include<E>>] {
        &self.includes
    }

    pub fn take(&self) -> u64 {
        self.take
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn is_paging_enabled(&self) -> bool {
        self.paging_enabled
    }
}

impl<E: EntityTrait> Default for ReadSpecification<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> Clone for ReadSpecification<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            order: self.order.clone(),
            then_order: self.then_order.clone(),
            take: self.take,
            skip: self.skip,
            paging_enabled: self.paging_enabled,
        }
    }
}

impl<E: EntityTrait> fmt::Debug for ReadSpecification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let includes: Vec<String> = self.includes.iter().map(|i| i.table()).collect();
        f.debug_struct("ReadSpecification")
            .field("filter", &self.filter)
            .field("includes", &includes)
            .field("order", &self.order)
            .field("then_order", &self.then_order)
            .field("take", &self.take)
            .field("skip", &self.skip)
            .field("paging_enabled", &self.paging_enabled)
            .finish()
    }
}
