//! Payment provider adapters.
//!
//! Each adapter turns one provider's wire protocol into the provider-agnostic
//! [`PaymentGateway`] contract: start a payment for an order, query the provider's
//! view of a payment, and authenticate inbound captures and webhooks into a
//! [`Settlement`]. Nothing in here touches order state; the reconciler does that.

pub mod client_receipt;
pub mod redirect;
pub mod server_capture;
pub mod signature;
pub mod transport;

use crate::domain::confirmation::{NormalizedConfirmation, Settlement};
use crate::domain::order::Order;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub use client_receipt::{ClientReceiptConfig, ClientReceiptGateway};
pub use redirect::{RedirectConfig, RedirectGateway};
pub use server_capture::{ServerCaptureConfig, ServerCaptureGateway};

/// What the purchaser's client has to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum Initiation {
    /// Send the purchaser to a hosted payment page.
    Redirect {
        redirect_url: String,
        provider_txn_id: String,
    },
    /// Hand the provider order to a client SDK, then call capture.
    ProviderOrder {
        provider_order_id: String,
        amount_minor: i64,
        currency: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_key: Option<String>,
    },
    /// Nothing to pay; the order is already settled.
    Settled,
}

impl Initiation {
    /// Provider correlation id to record on the order.
    pub fn provider_txn_id(&self) -> Option<&str> {
        match self {
            Initiation::Redirect {
                provider_txn_id, ..
            } => Some(provider_txn_id),
            Initiation::ProviderOrder {
                provider_order_id,
                ..
            } => Some(provider_order_id),
            Initiation::Settled => None,
        }
    }
}

/// A raw inbound provider request, before any authentication.
#[derive(Debug, Clone, Default)]
pub struct InboundCallback {
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl InboundCallback {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Required signature header; a missing header fails authentication.
    pub fn signature_header(&self, name: &str, gateway: &str) -> Result<&str> {
        self.header(name)
            .ok_or_else(|| CheckoutError::SignatureInvalid(gateway.to_string()))
    }

    /// A parameter from the query string, falling back to a form-encoded body.
    pub fn param(&self, name: &str) -> Option<String> {
        if let Some(value) = self.query.get(name) {
            return Some(value.clone());
        }
        serde_urlencoded::from_bytes::<HashMap<String, String>>(&self.body)
            .ok()
            .and_then(|mut form| form.remove(name))
    }

    pub fn body_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|_| CheckoutError::MalformedPayload("Body is not UTF-8".to_string()))
    }
}

/// Uniform contract implemented once per provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registry key, also the `{gateway}` path segment.
    fn name(&self) -> &str;

    /// Starts a payment for a pending order with a non-zero net amount.
    async fn initiate(&self, order: &Order) -> Result<Initiation>;

    /// Queries or validates the provider's view of a payment.
    async fn confirm(&self, provider_reference: &str) -> Result<NormalizedConfirmation>;

    /// Authenticates a purchaser-side return (redirect callback or SDK capture).
    async fn capture(&self, callback: &InboundCallback) -> Result<Settlement>;

    /// Authenticates a server-to-server notification.
    async fn webhook(&self, callback: &InboundCallback) -> Result<Settlement>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Gateways available to this process, keyed by name.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<String, PaymentGatewayRef>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: PaymentGatewayRef) {
        self.gateways.insert(gateway.name().to_string(), gateway);
    }

    pub fn with(mut self, gateway: PaymentGatewayRef) -> Self {
        self.register(gateway);
        self
    }

    pub fn get(&self, name: &str) -> Result<PaymentGatewayRef> {
        self.gateways
            .get(name)
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownGateway(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.gateways.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.gateways.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parses a provider JSON body, reporting the gateway on failure.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(gateway: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        CheckoutError::MalformedPayload(format!("{} payload could not be parsed: {}", gateway, e))
    })
}

/// Turns a non-2xx provider response into `GatewayRejected`, logging the raw body.
pub(crate) fn ensure_success(
    gateway: &str,
    response: &transport::HttpResponse,
) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let raw = response.text();
    tracing::warn!(gateway, status = response.status, raw = %raw, "Provider rejected request");
    Err(CheckoutError::GatewayRejected {
        gateway: gateway.to_string(),
        status: Some(response.status),
        raw,
    })
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
