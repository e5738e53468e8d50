use super::coupon::Coupon;
use super::order::{Order, OrderId, OrderNumber, Transition};
use super::resource::{CatalogItem, Resource, ResourceRef};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence of orders, together with the inventory they reserve.
///
/// Implementations must make `insert` and `settle` atomic with respect to the
/// inventory rows they touch, and must apply `settle` only while the order's
/// payment is still pending.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order, decrementing its reservation in the same transaction.
    async fn insert(&self, order: Order) -> Result<Order>;
    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;
    async fn find_by_provider_txn(&self, provider_txn_id: &str) -> Result<Option<Order>>;
    /// Conditional terminal transition; releases the reservation on failure.
    async fn settle(&self, id: &OrderId, transition: Transition) -> Result<Order>;
    async fn record_initiation(&self, id: &OrderId, provider_txn_id: &str) -> Result<Order>;
    async fn annotate(&self, id: &OrderId, remark: &str) -> Result<Order>;
    async fn all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn put_resource(&self, resource: Resource) -> Result<()>;
    async fn resource(&self, id: &str) -> Result<Option<Resource>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup(&self, item: &ResourceRef) -> Result<Option<CatalogItem>>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find(&self, code: &str) -> Result<Option<Coupon>>;
}

/// Outbound purchaser notifications (SMS, email). Best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_confirmed(&self, order: &Order) -> Result<()>;
}

/// Session lookup supplying the purchaser reference.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn purchaser(&self, token: &str) -> Result<Option<String>>;
}

pub trait IdGenerator: Send + Sync {
    fn next_order_id(&self) -> OrderId;
    fn next_order_number(&self) -> OrderNumber;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type InventoryStoreRef = Arc<dyn InventoryStore>;
pub type CatalogRef = Arc<dyn Catalog>;
pub type CouponRepositoryRef = Arc<dyn CouponRepository>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type IdentityProviderRef = Arc<dyn IdentityProvider>;
pub type IdGeneratorRef = Arc<dyn IdGenerator>;
pub type ClockRef = Arc<dyn Clock>;
