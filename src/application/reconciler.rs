use crate::domain::confirmation::{NormalizedConfirmation, PaymentSignal};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderId, PaymentStatus, Transition};
use crate::domain::ports::{CatalogRef, ClockRef, NotifierRef, OrderStoreRef};
use crate::error::{CheckoutError, Result};
use chrono::Duration;

/// Advances orders from authoritative provider confirmations.
///
/// The payment axis moves `pending -> paid | failed` exactly once; the store's
/// conditional `settle` decides which of two racing confirmations wins, and the
/// loser gets the settled order back as if it had been a no-op. Side effects
/// (inventory restoration, notification) only follow the winning transition.
#[derive(Clone)]
pub struct Reconciler {
    orders: OrderStoreRef,
    catalog: CatalogRef,
    notifier: NotifierRef,
    clock: ClockRef,
}

impl Reconciler {
    pub fn new(
        orders: OrderStoreRef,
        catalog: CatalogRef,
        notifier: NotifierRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            orders,
            catalog,
            notifier,
            clock,
        }
    }

    #[tracing::instrument(skip(self, confirmation), fields(signal = ?confirmation.signal, provider_status = %confirmation.provider_status))]
    pub async fn confirm(
        &self,
        order_id: &OrderId,
        confirmation: NormalizedConfirmation,
    ) -> Result<Order> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))?;

        if confirmation.signal == PaymentSignal::Pending {
            tracing::info!("Provider reports payment in flight, nothing to settle");
            return Ok(order);
        }
        if order.is_settled() {
            return self.already_settled(order, &confirmation).await;
        }

        let transition = self.transition_for(&order, &confirmation).await?;
        match self.orders.settle(order_id, transition).await {
            Ok(settled) => {
                tracing::info!(payment_status = %settled.payment_status, "Order settled");
                if settled.payment_status == PaymentStatus::Paid {
                    self.notify(&settled).await;
                }
                Ok(settled)
            }
            Err(CheckoutError::ReconciliationConflict(current)) => {
                self.already_settled(*current, &confirmation).await
            }
            Err(e) => Err(e),
        }
    }

    /// Compensating hook for explicit cancellation or an abandoned-checkout reaper.
    ///
    /// Settles a pending order as failed and hands its reservation back. A failed
    /// order is returned unchanged; a paid order cannot be cancelled here.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: &OrderId, reason: &str) -> Result<Order> {
        let transition = Transition::Failed {
            remark: format!("cancelled: {}", reason),
        };
        let order = match self.orders.settle(order_id, transition).await {
            Ok(order) => {
                tracing::info!("Order cancelled");
                order
            }
            Err(CheckoutError::ReconciliationConflict(current)) => *current,
            Err(e) => return Err(e),
        };
        if order.payment_status == PaymentStatus::Paid {
            return Err(CheckoutError::Validation(format!(
                "Order {} is paid and cannot be cancelled",
                order_id
            )));
        }
        Ok(order)
    }

    /// Handles a confirmation for an order whose payment axis is already final.
    ///
    /// Agreeing signals are no-ops. A contradicting signal cannot be reconciled
    /// automatically, so it is recorded on the order for manual follow-up; the
    /// same contradiction delivered again leaves the remark unchanged.
    async fn already_settled(
        &self,
        order: Order,
        confirmation: &NormalizedConfirmation,
    ) -> Result<Order> {
        let contradiction = match (order.payment_status, confirmation.signal) {
            (PaymentStatus::Paid, PaymentSignal::Failed) => {
                tracing::warn!(
                    order_id = %order.id,
                    "Provider reported failure after payment was confirmed; manual follow-up required"
                );
                "late failure"
            }
            (PaymentStatus::Failed, PaymentSignal::Paid) => {
                tracing::error!(
                    order_id = %order.id,
                    amount_minor = ?confirmation.amount_minor,
                    "Provider reported payment for a failed order; refund or manual follow-up required"
                );
                "late payment"
            }
            _ => {
                tracing::debug!(order_id = %order.id, payment_status = %order.payment_status, "Redundant confirmation ignored");
                return Ok(order);
            }
        };

        let remark = format!(
            "{} reported by provider: {}{}",
            contradiction,
            confirmation.provider_status,
            confirmation
                .reference
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
        if order.has_remark(&remark) {
            return Ok(order);
        }
        self.orders.annotate(&order.id, &remark).await
    }

    async fn transition_for(
        &self,
        order: &Order,
        confirmation: &NormalizedConfirmation,
    ) -> Result<Transition> {
        if confirmation.signal == PaymentSignal::Failed {
            return Ok(Transition::Failed {
                remark: format!("payment failed: provider status {}", confirmation.provider_status),
            });
        }

        let expected = order.net_amount.to_minor()?;
        let Some(reported) = confirmation.amount_minor else {
            tracing::error!(order_id = %order.id, expected, "Provider reported payment without an amount");
            return Ok(Transition::Failed {
                remark: format!(
                    "amount missing: expected {}, provider status {}",
                    expected, confirmation.provider_status
                ),
            });
        };
        if reported != expected {
            tracing::error!(
                order_id = %order.id,
                expected,
                reported,
                "Provider amount does not match the order"
            );
            return Ok(Transition::Failed {
                remark: format!(
                    "amount mismatch: expected {}, provider reported {}",
                    expected, reported
                ),
            });
        }

        let validity_days = match self.catalog.lookup(&order.resource).await? {
            Some(item) => item.validity_days,
            None => {
                tracing::warn!(order_id = %order.id, resource = %order.resource, "Catalog item vanished; validity window is empty");
                0
            }
        };
        let now = self.clock.now();
        let reference = confirmation
            .reference
            .clone()
            .or_else(|| order.provider_txn_id.clone())
            .unwrap_or_else(|| order.id.merchant_txn_id());

        Ok(Transition::Paid {
            reference,
            amount_paid: Money::from_minor(reported),
            valid_from: now,
            valid_to: now + Duration::days(i64::from(validity_days)),
        })
    }

    async fn notify(&self, order: &Order) {
        if let Err(e) = self.notifier.order_confirmed(order).await {
            tracing::warn!(order_id = %order.id, error = %e, "Confirmation notification failed");
        }
    }
}
