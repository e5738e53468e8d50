use super::money::Money;
use crate::error::{CheckoutError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an order buys: a subscription plan, or units of a finite resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceRef {
    Plan { plan_id: String },
    Seats { resource_id: String, quantity: u32 },
}

impl ResourceRef {
    pub fn plan(plan_id: impl Into<String>) -> Self {
        Self::Plan {
            plan_id: plan_id.into(),
        }
    }

    pub fn seats(resource_id: impl Into<String>, quantity: u32) -> Self {
        Self::Seats {
            resource_id: resource_id.into(),
            quantity,
        }
    }

    /// Catalog key of the referenced item.
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Plan { plan_id } => plan_id,
            ResourceRef::Seats { resource_id, .. } => resource_id,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            ResourceRef::Plan { .. } => 1,
            ResourceRef::Seats { quantity, .. } => *quantity,
        }
    }

    /// Inventory hold required when placing an order for this reference.
    pub fn reservation(&self) -> Option<Reservation> {
        match self {
            ResourceRef::Plan { .. } => None,
            ResourceRef::Seats {
                resource_id,
                quantity,
            } => Some(Reservation::new(resource_id.clone(), *quantity)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(CheckoutError::Validation("Resource id must not be empty".to_string()));
        }
        if self.quantity() == 0 {
            return Err(CheckoutError::Validation("Quantity must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Plan { plan_id } => write!(f, "plan:{}", plan_id),
            ResourceRef::Seats {
                resource_id,
                quantity,
            } => write!(f, "seats:{}x{}", resource_id, quantity),
        }
    }
}

/// Price and validity period of something the catalog sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub unit_price: Money,
    #[serde(default)]
    pub validity_days: u32,
}

/// A countable pool (e.g. the seats on one scheduled vehicle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub total: u32,
    pub available: u32,
    pub unit_price: Money,
}

impl Resource {
    pub fn new(id: impl Into<String>, total: u32, unit_price: Money) -> Self {
        Self {
            id: id.into(),
            total,
            available: total,
            unit_price,
        }
    }

    /// Conditional decrement: succeeds only when enough units remain.
    pub fn take(&mut self, quantity: u32) -> Result<()> {
        if self.available < quantity {
            return Err(CheckoutError::InsufficientInventory {
                resource_id: self.id.clone(),
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        Ok(())
    }

    /// Returns units to the pool, never exceeding capacity.
    pub fn restore(&mut self, quantity: u32) {
        self.available = self.available.saturating_add(quantity).min(self.total);
    }
}

/// Units held by an order; `released` flips once so restoration happens at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub resource_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub released: bool,
}

impl Reservation {
    pub fn new(resource_id: String, quantity: u32) -> Self {
        Self {
            resource_id,
            quantity,
            released: false,
        }
    }
}
