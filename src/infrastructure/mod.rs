//! Adapters behind the domain ports: stores, catalog data, ids, notifications.

pub mod catalog;
pub mod id;
pub mod in_memory;
pub mod notifier;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
