use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRecord<'a> {
    order: &'a str,
    number: &'a str,
    resource: String,
    gateway: &'a str,
    gross: String,
    discount: String,
    net: String,
    status: String,
    payment_status: String,
    reference: &'a str,
    remark: &'a str,
}

/// Writes final order state as CSV.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per `(label, order)` pair, then flushes.
    pub fn write_orders(&mut self, orders: &[(String, Order)]) -> Result<()> {
        for (label, order) in orders {
            self.writer.serialize(OrderRecord {
                order: label,
                number: &order.number.0,
                resource: order.resource.to_string(),
                gateway: &order.gateway,
                gross: order.gross_amount.to_string(),
                discount: order.discount.to_string(),
                net: order.net_amount.to_string(),
                status: order.status.to_string(),
                payment_status: order.payment_status.to_string(),
                reference: order.payment_reference_id.as_deref().unwrap_or_default(),
                remark: order.remark.as_deref().unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
