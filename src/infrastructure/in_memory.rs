use crate::domain::order::{Order, OrderId, OrderNumber, Transition};
use crate::domain::ports::{InventoryStore, OrderStore};
use crate::domain::resource::Resource;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    numbers: HashMap<OrderNumber, OrderId>,
    provider_refs: HashMap<String, OrderId>,
    resources: HashMap<String, Resource>,
}

/// A thread-safe in-memory order and inventory store.
///
/// All tables sit behind one `tokio::sync::Mutex`, so holding the guard is the
/// transaction: an order insert and its inventory decrement, or a settlement
/// and its inventory restoration, are observed together or not at all.
/// Ideal for testing or single-process deployments where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert(&self, order: Order) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        if tables.orders.contains_key(&order.id) {
            return Err(CheckoutError::DuplicateOrder(order.id.to_string()));
        }
        if tables.numbers.contains_key(&order.number) {
            return Err(CheckoutError::DuplicateOrder(order.number.to_string()));
        }

        if let Some(reservation) = &order.reservation {
            let resource = tables
                .resources
                .get_mut(&reservation.resource_id)
                .ok_or_else(|| CheckoutError::UnknownResource(reservation.resource_id.clone()))?;
            resource.take(reservation.quantity)?;
        }

        tables.numbers.insert(order.number.clone(), order.id);
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(id).cloned())
    }

    async fn find_by_provider_txn(&self, provider_txn_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .provider_refs
            .get(provider_txn_id)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn settle(&self, id: &OrderId, transition: Transition) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        let mut order = tables
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| CheckoutError::OrderNotFound(id.to_string()))?;

        if let Some(released) = order.settle(&transition)? {
            match tables.resources.get_mut(&released.resource_id) {
                Some(resource) => resource.restore(released.quantity),
                None => tracing::warn!(
                    order_id = %id,
                    resource_id = %released.resource_id,
                    "Reserved resource vanished before restoration"
                ),
            }
        }

        tables.orders.insert(*id, order.clone());
        Ok(order)
    }

    async fn record_initiation(&self, id: &OrderId, provider_txn_id: &str) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| CheckoutError::OrderNotFound(id.to_string()))?;
        order.record_initiation(provider_txn_id)?;
        let order = order.clone();
        tables.provider_refs.insert(provider_txn_id.to_string(), *id);
        Ok(order)
    }

    async fn annotate(&self, id: &OrderId, remark: &str) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| CheckoutError::OrderNotFound(id.to_string()))?;
        order.append_remark(remark);
        Ok(order.clone())
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables.orders.values().cloned().collect();
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn put_resource(&self, resource: Resource) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    async fn resource(&self, id: &str) -> Result<Option<Resource>> {
        let tables = self.tables.lock().await;
        Ok(tables.resources.get(id).cloned())
    }
}
