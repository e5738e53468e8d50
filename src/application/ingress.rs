use super::reconciler::Reconciler;
use crate::domain::confirmation::{OrderRef, Settlement};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::OrderStoreRef;
use crate::error::{CheckoutError, Result};
use crate::gateway::{GatewayRegistry, InboundCallback};

/// Result of an authenticated webhook delivery.
///
/// Either way the provider is acknowledged: the payload was genuine and parsed,
/// so a retry would not change anything.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied(Order),
    /// Authentic, but names an order this system does not know.
    UnknownOrder(String),
}

/// Entry point for inbound provider traffic: authenticate, normalize, reconcile.
///
/// Anything that fails authentication or parsing is returned as an error and
/// never reaches the reconciler.
#[derive(Clone)]
pub struct CallbackIngress {
    gateways: GatewayRegistry,
    orders: OrderStoreRef,
    reconciler: Reconciler,
}

impl CallbackIngress {
    pub fn new(gateways: GatewayRegistry, orders: OrderStoreRef, reconciler: Reconciler) -> Self {
        Self {
            gateways,
            orders,
            reconciler,
        }
    }

    /// Purchaser-side return from the provider (redirect callback or SDK capture).
    #[tracing::instrument(skip(self, callback))]
    pub async fn capture(&self, gateway: &str, callback: &InboundCallback) -> Result<Order> {
        let adapter = self.gateways.get(gateway)?;
        let settlement = adapter
            .capture(callback)
            .await
            .inspect_err(|e| log_rejection(gateway, e))?;
        self.apply(gateway, settlement).await
    }

    /// Server-to-server notification.
    #[tracing::instrument(skip(self, callback))]
    pub async fn webhook(&self, gateway: &str, callback: &InboundCallback) -> Result<WebhookOutcome> {
        let adapter = self.gateways.get(gateway)?;
        let settlement = adapter
            .webhook(callback)
            .await
            .inspect_err(|e| log_rejection(gateway, e))?;
        match self.apply(gateway, settlement).await {
            Ok(order) => Ok(WebhookOutcome::Applied(order)),
            Err(CheckoutError::OrderNotFound(reference)) => {
                tracing::error!(%reference, "Authenticated webhook for an unknown order");
                Ok(WebhookOutcome::UnknownOrder(reference))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, gateway: &str, settlement: Settlement) -> Result<Order> {
        let order_id = self.resolve(&settlement.order).await?;
        let order = self
            .orders
            .get(&order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))?;

        if order.gateway != gateway {
            return Err(CheckoutError::MalformedPayload(format!(
                "Order {} was not placed through {}",
                order.id, gateway
            )));
        }
        // A named provider order must be the one recorded at initiation.
        if let Some(named) = &settlement.provider_order_id
            && order.provider_txn_id.as_deref() != Some(named.as_str())
        {
            return Err(CheckoutError::MalformedPayload(format!(
                "Provider order {} does not belong to order {}",
                named, order.id
            )));
        }

        self.reconciler.confirm(&order_id, settlement.confirmation).await
    }

    async fn resolve(&self, reference: &OrderRef) -> Result<OrderId> {
        match reference {
            OrderRef::Merchant(id) => Ok(*id),
            OrderRef::Provider(provider_txn_id) => self
                .orders
                .find_by_provider_txn(provider_txn_id)
                .await?
                .map(|order| order.id)
                .ok_or_else(|| CheckoutError::OrderNotFound(provider_txn_id.clone())),
        }
    }
}

fn log_rejection(gateway: &str, error: &CheckoutError) {
    match error {
        CheckoutError::SignatureInvalid(_) => {
            tracing::warn!(gateway, "Inbound payload failed signature verification")
        }
        CheckoutError::MalformedPayload(detail) => {
            tracing::warn!(gateway, %detail, "Inbound payload could not be parsed")
        }
        other => tracing::warn!(gateway, error = %other, "Inbound payload rejected"),
    }
}
