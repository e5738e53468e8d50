use crate::domain::order::Order;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),
    #[error("Insufficient inventory for resource {resource_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        resource_id: String,
        requested: u32,
        available: u32,
    },
    #[error("Gateway {gateway} rejected the request (status {status:?}): {raw}")]
    GatewayRejected {
        gateway: String,
        status: Option<u16>,
        raw: String,
    },
    #[error("Signature verification failed for gateway {0}")]
    SignatureInvalid(String),
    /// A settlement attempt lost against an already terminal order.
    #[error("Order {} is already settled", .0.id)]
    ReconciliationConflict(Box<Order>),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Unknown gateway: {0}")]
    UnknownGateway(String),
    #[error("Duplicate order identifier: {0}")]
    DuplicateOrder(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl CheckoutError {
    /// Text that is safe to show to a purchaser. Diagnostic detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            CheckoutError::InvalidCoupon(_) => "The coupon code is not valid",
            CheckoutError::InsufficientInventory { .. } => "Sold out, please try again later",
            CheckoutError::GatewayRejected { .. } | CheckoutError::Transport(_) => {
                "The payment provider is unavailable, please try again"
            }
            CheckoutError::SignatureInvalid(_) | CheckoutError::Unauthorized => "Unauthorized",
            CheckoutError::ReconciliationConflict(_) => "Order already settled",
            CheckoutError::Validation(_) | CheckoutError::MalformedPayload(_) => "Invalid request",
            CheckoutError::OrderNotFound(_) => "Order not found",
            CheckoutError::UnknownResource(_) => "Item not found",
            CheckoutError::UnknownGateway(_) => "Payment method not available",
            _ => "Something went wrong",
        }
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::Transport(err.to_string())
    }
}

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;
