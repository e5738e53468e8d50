use super::order::OrderId;
use serde::{Deserialize, Serialize};

/// Provider outcome reduced to what the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSignal {
    Paid,
    Failed,
    /// A known in-flight provider state; nothing to settle yet.
    Pending,
}

/// The single shape every provider payload is normalized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedConfirmation {
    pub signal: PaymentSignal,
    /// Amount the provider reports, in minor units.
    pub amount_minor: Option<i64>,
    /// Provider payment reference (transaction / capture / payment id).
    pub reference: Option<String>,
    /// Raw provider status, kept for remarks and logs.
    pub provider_status: String,
}

impl NormalizedConfirmation {
    pub fn new(
        signal: PaymentSignal,
        provider_status: impl Into<String>,
        amount_minor: Option<i64>,
        reference: Option<String>,
    ) -> Self {
        Self {
            signal,
            amount_minor,
            reference,
            provider_status: provider_status.into(),
        }
    }

    /// Settlement for orders whose net amount is zero.
    pub fn complimentary(reference: String) -> Self {
        Self::new(PaymentSignal::Paid, "COMPLIMENTARY", Some(0), Some(reference))
    }
}

/// How an authenticated provider payload points back at an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    /// Decoded from the merchant transaction id we sent.
    Merchant(OrderId),
    /// Only the provider's own order id is known; resolved through the store.
    Provider(String),
}

/// A verified confirmation together with the order it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub order: OrderRef,
    /// Provider order id named by the payload, checked against the one recorded at initiation.
    pub provider_order_id: Option<String>,
    pub confirmation: NormalizedConfirmation,
}

impl Settlement {
    pub fn for_order(order_id: OrderId, confirmation: NormalizedConfirmation) -> Self {
        Self {
            order: OrderRef::Merchant(order_id),
            provider_order_id: None,
            confirmation,
        }
    }
}

/// Maps a provider status onto a signal using the provider's own vocabulary.
///
/// Matching is case-insensitive; anything not listed as paid or pending is a failure.
pub fn classify(status: &str, paid: &[&str], pending: &[&str]) -> PaymentSignal {
    let matches = |set: &[&str]| set.iter().any(|s| s.eq_ignore_ascii_case(status.trim()));
    if matches(paid) {
        PaymentSignal::Paid
    } else if matches(pending) {
        PaymentSignal::Pending
    } else {
        PaymentSignal::Failed
    }
}
