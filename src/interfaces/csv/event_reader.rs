use crate::domain::resource::ResourceRef;
use crate::error::{CheckoutError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOp {
    Place,
    Confirm,
    Cancel,
}

/// One row of the replay ledger.
///
/// `order` is a caller-chosen alias; `resource` is `plan:<id>` or `seats:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerEvent {
    pub op: EventOp,
    pub order: String,
    pub resource: Option<String>,
    pub quantity: Option<u32>,
    pub gateway: Option<String>,
    pub coupon: Option<String>,
    pub status: Option<String>,
    pub amount_minor: Option<i64>,
    pub reference: Option<String>,
}

impl LedgerEvent {
    pub fn resource_ref(&self) -> Result<ResourceRef> {
        let raw = self.resource.as_deref().ok_or_else(|| {
            CheckoutError::Validation(format!("Event for {} has no resource", self.order))
        })?;
        match raw.split_once(':') {
            Some(("plan", id)) => Ok(ResourceRef::plan(id)),
            Some(("seats", id)) => Ok(ResourceRef::seats(id, self.quantity.unwrap_or(1))),
            _ => Err(CheckoutError::Validation(format!(
                "Unrecognised resource {}, expected plan:<id> or seats:<id>",
                raw
            ))),
        }
    }
}

/// Reads ledger events from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<LedgerEvent>`.
/// It trims whitespace and tolerates short rows, so trailing empty columns can be omitted.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes events, one row at a time.
    pub fn events(self) -> impl Iterator<Item = Result<LedgerEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CheckoutError::from))
    }
}
