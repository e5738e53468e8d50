use super::discount::DiscountResolver;
use super::reconciler::Reconciler;
use crate::domain::confirmation::NormalizedConfirmation;
use crate::domain::coupon::Quote;
use crate::domain::order::{Contact, NewOrder, Order, OrderId};
use crate::domain::ports::{CatalogRef, ClockRef, IdGeneratorRef, OrderStoreRef};
use crate::domain::resource::ResourceRef;
use crate::error::{CheckoutError, Result};
use crate::gateway::{GatewayRegistry, Initiation};
use serde::{Deserialize, Serialize};

/// Attempts at drawing a fresh id and order number before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// A purchase request, already stripped of transport concerns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceOrder {
    pub resource: ResourceRef,
    pub gateway: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub purchaser: Option<String>,
}

/// A persisted order and what the client must do next to pay for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub initiation: Initiation,
}

/// Places orders and starts their payment.
///
/// Placing and initiating are separate steps so a caller driving them directly
/// can retry a failed provider call without creating a second order.
/// [`CheckoutService::checkout`] instead cancels the order when initiation fails.
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderStoreRef,
    catalog: CatalogRef,
    discounts: DiscountResolver,
    gateways: GatewayRegistry,
    ids: IdGeneratorRef,
    clock: ClockRef,
    reconciler: Reconciler,
}

impl CheckoutService {
    pub fn new(
        orders: OrderStoreRef,
        catalog: CatalogRef,
        discounts: DiscountResolver,
        gateways: GatewayRegistry,
        ids: IdGeneratorRef,
        clock: ClockRef,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            orders,
            catalog,
            discounts,
            gateways,
            ids,
            clock,
            reconciler,
        }
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    /// Prices a purchase without persisting anything.
    pub async fn quote(&self, resource: &ResourceRef, coupon_code: Option<&str>) -> Result<Quote> {
        resource.validate()?;
        let item = self
            .catalog
            .lookup(resource)
            .await?
            .ok_or_else(|| CheckoutError::UnknownResource(resource.id().to_string()))?;
        let base = item.unit_price.times(resource.quantity());
        self.discounts.resolve(base, coupon_code, self.clock.now()).await
    }

    /// Persists a pending order, reserving inventory when the resource is finite.
    #[tracing::instrument(skip(self, request), fields(resource = %request.resource, gateway = %request.gateway))]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order> {
        if request.gateway.trim().is_empty() {
            return Err(CheckoutError::Validation("Gateway must not be empty".to_string()));
        }
        request.resource.validate()?;
        if let Some(contact) = &request.contact {
            contact.validate()?;
        }

        let coupon_code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);
        let quote = self.quote(&request.resource, coupon_code.as_deref()).await?;
        let new = NewOrder {
            resource: request.resource,
            quote,
            gateway: request.gateway,
            contact: request.contact,
            purchaser: request.purchaser,
            coupon_code,
        };
        let now = self.clock.now();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let order = Order::new(
                self.ids.next_order_id(),
                self.ids.next_order_number(),
                new.clone(),
                now,
            );
            match self.orders.insert(order).await {
                Err(CheckoutError::DuplicateOrder(key)) if attempt < MAX_ID_ATTEMPTS => {
                    tracing::warn!(%key, attempt, "Order identifier collision, retrying");
                }
                Ok(order) => {
                    tracing::info!(order_id = %order.id, order_number = %order.number, net = %order.net_amount, "Order placed");
                    return Ok(order);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Starts payment for a pending order through the gateway it was placed with.
    ///
    /// Orders with nothing to pay are settled on the spot with a complimentary
    /// confirmation instead of reaching a provider.
    #[tracing::instrument(skip(self))]
    pub async fn initiate(&self, order_id: &OrderId) -> Result<CheckoutOutcome> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))?;
        if order.is_settled() {
            return Err(CheckoutError::Validation(format!(
                "Order {} is no longer pending",
                order.id
            )));
        }

        if order.net_amount.is_zero() {
            let confirmation =
                NormalizedConfirmation::complimentary(format!("COMPLIMENTARY-{}", order.number));
            let order = self.reconciler.confirm(&order.id, confirmation).await?;
            return Ok(CheckoutOutcome {
                order,
                initiation: Initiation::Settled,
            });
        }

        let gateway = self.gateways.get(&order.gateway)?;
        let initiation = gateway.initiate(&order).await?;
        let order = match initiation.provider_txn_id() {
            Some(provider_txn_id) => {
                self.orders
                    .record_initiation(&order.id, provider_txn_id)
                    .await?
            }
            None => order,
        };
        tracing::info!(order_id = %order.id, gateway = gateway.name(), "Payment initiated");
        Ok(CheckoutOutcome { order, initiation })
    }

    /// Checks the gateway, places the order, then initiates its payment.
    ///
    /// If initiation fails the order is cancelled, releasing its reservation,
    /// and the initiation error is returned.
    pub async fn checkout(&self, request: PlaceOrder) -> Result<CheckoutOutcome> {
        if !self.gateways.contains(&request.gateway) {
            return Err(CheckoutError::UnknownGateway(request.gateway));
        }
        let order = self.place_order(request).await?;
        match self.initiate(&order.id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Payment initiation failed, cancelling order");
                if let Err(cancel_error) = self.reconciler.cancel(&order.id, "initiation failed").await {
                    tracing::error!(order_id = %order.id, error = %cancel_error, "Could not cancel order after failed initiation");
                }
                Err(e)
            }
        }
    }
}
