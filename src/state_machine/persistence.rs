use super::errors::{PersistenceError, PersistenceResult};
use super::states::OrderState;
use crate::models::{BackendRef, Order, PageCursor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// One status change to append to an order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionChange {
    pub to: OrderState,
    pub event: String,
    pub reason: Option<String>,
    /// Set on dispatch; stored on the order together with the new record.
    pub backend_ref: Option<BackendRef>,
    pub at: DateTime<Utc>,
}

/// Storage for orders and their status histories.
///
/// `append_transition` is the only way an order changes after insertion. It is
/// a compare-and-append: the change is applied only if the stored order is
/// still in `expected` at `expected_version`, otherwise it fails with
/// [`PersistenceError::ConcurrentModification`] and nothing is written.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> PersistenceResult<()>;

    async fn get(&self, order_id: Uuid) -> PersistenceResult<Option<Order>>;

    /// Orders by ascending `(created_at, id)`, strictly after `after`.
    async fn list(&self, after: Option<&PageCursor>, limit: usize)
        -> PersistenceResult<Vec<Order>>;

    async fn append_transition(
        &self,
        order_id: Uuid,
        expected: OrderState,
        expected_version: usize,
        change: TransitionChange,
    ) -> PersistenceResult<Order>;
}

/// Order store backed by a sharded concurrent map.
///
/// Compare-and-append runs under the map's per-entry write lock, which is never
/// held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, Order>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> PersistenceResult<()> {
        match self.orders.entry(order.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PersistenceError::AlreadyExists {
                order_id: order.id(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, order_id: Uuid) -> PersistenceResult<Option<Order>> {
        Ok(self.orders.get(&order_id).map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        after: Option<&PageCursor>,
        limit: usize,
    ) -> PersistenceResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                after.map_or(true, |cursor| {
                    cursor.precedes(order.created_at(), &order.id().to_string())
                })
            })
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| (order.created_at(), order.id().to_string()));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn append_transition(
        &self,
        order_id: Uuid,
        expected: OrderState,
        expected_version: usize,
        change: TransitionChange,
    ) -> PersistenceResult<Order> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or(PersistenceError::NotFound { order_id })?;
        let order = entry.value_mut();

        if order.status() != expected || order.version() != expected_version {
            return Err(PersistenceError::ConcurrentModification {
                order_id,
                expected,
                expected_version,
                actual: order.status(),
                actual_version: order.version(),
            });
        }

        if let Some(backend_ref) = change.backend_ref {
            order.set_backend_ref(backend_ref);
        }
        order.record_transition(change.to, &change.event, change.reason, change.at);
        Ok(order.clone())
    }
}
