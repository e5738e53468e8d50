use crate::domain::order::Order;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;

/// Writes confirmations to the log instead of sending SMS or email.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, order: &Order) -> Result<()> {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.number,
            has_phone = order.contact.as_ref().is_some_and(|c| c.phone.is_some()),
            has_email = order.contact.as_ref().is_some_and(|c| c.email.is_some()),
            "Order confirmation dispatched"
        );
        Ok(())
    }
}
