use crate::domain::order::{Order, OrderId, Transition};
use crate::domain::ports::{InventoryStore, OrderStore};
use crate::domain::resource::Resource;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, Transaction, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for inventory rows, keyed by resource id.
pub const CF_RESOURCES: &str = "resources";
/// Column Family enforcing unique display numbers (number -> order id).
pub const CF_ORDER_NUMBERS: &str = "order_numbers";
/// Column Family mapping provider transaction ids to order ids.
pub const CF_PROVIDER_REFS: &str = "provider_refs";

/// A persistent store implementation using a RocksDB `TransactionDB`.
///
/// Every mutation runs in a pessimistic transaction: rows are read with
/// `get_for_update_cf`, which locks them until commit, so an order insert and
/// its inventory decrement (or a settlement and its restoration) commit together.
/// Dropping an uncommitted transaction rolls it back.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_RESOURCES, CF_ORDER_NUMBERS, CF_PROVIDER_REFS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            families,
        )?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CheckoutError::Storage(format!("Column family {} not found", name)))
    }

    fn read_locked<T: DeserializeOwned>(
        txn: &Transaction<'_, TransactionDB>,
        cf: &ColumnFamily,
        key: &[u8],
    ) -> Result<Option<T>> {
        match txn.get_for_update_cf(cf, key, true)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(
        txn: &Transaction<'_, TransactionDB>,
        cf: &ColumnFamily,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        txn.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn insert_sync(&self, order: Order) -> Result<Order> {
        let orders = self.cf(CF_ORDERS)?;
        let numbers = self.cf(CF_ORDER_NUMBERS)?;
        let resources = self.cf(CF_RESOURCES)?;
        let txn = self.db.transaction();

        let id_key = order.id.to_string();
        if txn.get_for_update_cf(orders, id_key.as_bytes(), true)?.is_some() {
            return Err(CheckoutError::DuplicateOrder(id_key));
        }
        if txn
            .get_for_update_cf(numbers, order.number.0.as_bytes(), true)?
            .is_some()
        {
            return Err(CheckoutError::DuplicateOrder(order.number.to_string()));
        }

        if let Some(reservation) = &order.reservation {
            let key = reservation.resource_id.as_bytes();
            let mut resource: Resource = Self::read_locked(&txn, resources, key)?
                .ok_or_else(|| CheckoutError::UnknownResource(reservation.resource_id.clone()))?;
            resource.take(reservation.quantity)?;
            Self::write(&txn, resources, key, &resource)?;
        }

        txn.put_cf(numbers, order.number.0.as_bytes(), id_key.as_bytes())?;
        Self::write(&txn, orders, id_key.as_bytes(), &order)?;
        txn.commit()?;
        Ok(order)
    }

    fn settle_sync(&self, id: &OrderId, transition: &Transition) -> Result<Order> {
        let orders = self.cf(CF_ORDERS)?;
        let resources = self.cf(CF_RESOURCES)?;
        let txn = self.db.transaction();

        let key = id.to_string();
        let mut order: Order = Self::read_locked(&txn, orders, key.as_bytes())?
            .ok_or_else(|| CheckoutError::OrderNotFound(key.clone()))?;

        if let Some(released) = order.settle(transition)? {
            let resource_key = released.resource_id.as_bytes();
            match Self::read_locked::<Resource>(&txn, resources, resource_key)? {
                Some(mut resource) => {
                    resource.restore(released.quantity);
                    Self::write(&txn, resources, resource_key, &resource)?;
                }
                None => tracing::warn!(
                    order_id = %id,
                    resource_id = %released.resource_id,
                    "Reserved resource vanished before restoration"
                ),
            }
        }

        Self::write(&txn, orders, key.as_bytes(), &order)?;
        txn.commit()?;
        Ok(order)
    }

    fn update_sync<F>(&self, id: &OrderId, index: Option<&str>, mutate: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> Result<()>,
    {
        let orders = self.cf(CF_ORDERS)?;
        let refs = self.cf(CF_PROVIDER_REFS)?;
        let txn = self.db.transaction();

        let key = id.to_string();
        let mut order: Order = Self::read_locked(&txn, orders, key.as_bytes())?
            .ok_or_else(|| CheckoutError::OrderNotFound(key.clone()))?;
        mutate(&mut order)?;

        if let Some(provider_txn_id) = index {
            txn.put_cf(refs, provider_txn_id.as_bytes(), key.as_bytes())?;
        }
        Self::write(&txn, orders, key.as_bytes(), &order)?;
        txn.commit()?;
        Ok(order)
    }

    fn get_sync<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order) -> Result<Order> {
        self.insert_sync(order)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        self.get_sync(CF_ORDERS, id.to_string().as_bytes())
    }

    async fn find_by_provider_txn(&self, provider_txn_id: &str) -> Result<Option<Order>> {
        let refs = self.cf(CF_PROVIDER_REFS)?;
        match self.db.get_cf(refs, provider_txn_id.as_bytes())? {
            Some(order_key) => self.get_sync(CF_ORDERS, &order_key),
            None => Ok(None),
        }
    }

    async fn settle(&self, id: &OrderId, transition: Transition) -> Result<Order> {
        self.settle_sync(id, &transition)
    }

    async fn record_initiation(&self, id: &OrderId, provider_txn_id: &str) -> Result<Order> {
        self.update_sync(id, Some(provider_txn_id), |order| {
            order.record_initiation(provider_txn_id)
        })
    }

    async fn annotate(&self, id: &OrderId, remark: &str) -> Result<Order> {
        self.update_sync(id, None, |order| {
            order.append_remark(remark);
            Ok(())
        })
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let handle = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(serde_json::from_slice::<Order>(&value)?);
        }
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }
}

#[async_trait]
impl InventoryStore for RocksDBStore {
    async fn put_resource(&self, resource: Resource) -> Result<()> {
        let cf = self.cf(CF_RESOURCES)?;
        self.db
            .put_cf(cf, resource.id.as_bytes(), serde_json::to_vec(&resource)?)?;
        Ok(())
    }

    async fn resource(&self, id: &str) -> Result<Option<Resource>> {
        self.get_sync(CF_RESOURCES, id.as_bytes())
    }
}
