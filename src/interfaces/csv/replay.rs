use super::event_reader::{EventOp, LedgerEvent};
use crate::application::checkout::PlaceOrder;
use crate::application::engine::CheckoutEngine;
use crate::domain::confirmation::{NormalizedConfirmation, PaymentSignal, classify};
use crate::domain::order::{Order, OrderId};
use crate::error::{CheckoutError, Result};
use std::collections::HashMap;

const DEFAULT_CANCEL_REASON: &str = "cancelled";

/// Drives a ledger of events through the engine without contacting providers.
///
/// Confirm rows carry an already-normalized status (`paid`, `failed`, `pending`);
/// anything else fails closed like an unknown provider status.
pub struct Replayer {
    engine: CheckoutEngine,
    aliases: HashMap<String, OrderId>,
}

impl Replayer {
    pub fn new(engine: CheckoutEngine) -> Self {
        Self {
            engine,
            aliases: HashMap::new(),
        }
    }

    pub async fn apply(&mut self, event: LedgerEvent) -> Result<Order> {
        match event.op {
            EventOp::Place => self.place(event).await,
            EventOp::Confirm => {
                let id = self.lookup(&event.order)?;
                let status = event.status.unwrap_or_default();
                let signal = classify(&status, &["paid"], &["pending"]);
                if signal == PaymentSignal::Failed && !status.eq_ignore_ascii_case("failed") {
                    tracing::warn!(order = %event.order, %status, "Unknown status treated as failure");
                }
                let confirmation =
                    NormalizedConfirmation::new(signal, status, event.amount_minor, event.reference);
                self.engine.reconciler.confirm(&id, confirmation).await
            }
            EventOp::Cancel => {
                let id = self.lookup(&event.order)?;
                let reason = event.status.as_deref().unwrap_or(DEFAULT_CANCEL_REASON);
                self.engine.reconciler.cancel(&id, reason).await
            }
        }
    }

    async fn place(&mut self, event: LedgerEvent) -> Result<Order> {
        if self.aliases.contains_key(&event.order) {
            return Err(CheckoutError::Validation(format!(
                "Order alias {} is already in use",
                event.order
            )));
        }
        let request = PlaceOrder {
            resource: event.resource_ref()?,
            gateway: event.gateway.clone().unwrap_or_default(),
            coupon_code: event.coupon.clone(),
            contact: None,
            purchaser: None,
        };
        let mut order = self.engine.checkout.place_order(request).await?;
        self.aliases.insert(event.order, order.id);
        if order.net_amount.is_zero() {
            order = self.engine.checkout.initiate(&order.id).await?.order;
        }
        Ok(order)
    }

    /// Aliases from this run, or a raw order id from an earlier run on a persistent store.
    fn lookup(&self, alias: &str) -> Result<OrderId> {
        match self.aliases.get(alias) {
            Some(id) => Ok(*id),
            None => alias
                .parse()
                .map_err(|_| CheckoutError::OrderNotFound(alias.to_string())),
        }
    }

    /// Every order in the store, labelled with its alias when it has one.
    pub async fn finish(self) -> Result<Vec<(String, Order)>> {
        let labels: HashMap<OrderId, String> = self
            .aliases
            .into_iter()
            .map(|(alias, id)| (id, alias))
            .collect();
        let orders = self.engine.orders().await?;
        Ok(orders
            .into_iter()
            .map(|order| {
                let label = labels
                    .get(&order.id)
                    .cloned()
                    .unwrap_or_else(|| order.id.to_string());
                (label, order)
            })
            .collect())
    }
}
