use super::money::Money;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

/// A discount rule looked up by its exact, case-sensitive code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub kind: DiscountKind,
    /// Percent for `Percentage`, amount in major units for `Fixed`.
    pub value: Decimal,
    /// Upper bound on the discount, only meaningful for percentages.
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Outcome of pricing a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
}

impl Quote {
    pub fn full_price(gross: Money) -> Self {
        Self {
            gross,
            discount: Money::ZERO,
            net: gross,
        }
    }
}

impl Coupon {
    /// Active and inside its validity window. Missing bounds are unbounded.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from.is_none_or(|from| now >= from)
            && self.valid_to.is_none_or(|to| now <= to)
    }

    /// Discount this coupon grants on `base`, before clamping the final amount.
    pub fn discount_on(&self, base: Money) -> Money {
        match self.kind {
            DiscountKind::Percentage => {
                let raw = Money::new(base.value() * self.value / Decimal::ONE_HUNDRED).round_to_unit();
                match self.max_discount {
                    Some(cap) if raw > cap => cap,
                    _ => raw,
                }
            }
            DiscountKind::Fixed => {
                let value = Money::new(self.value);
                if value > base { base } else { value }
            }
        }
    }

    /// Prices `base` with this coupon at `now`.
    ///
    /// Fails with `InvalidCoupon` when the coupon is inactive or out of its window;
    /// the final amount never goes below zero.
    pub fn apply(&self, base: Money, now: DateTime<Utc>) -> Result<Quote> {
        if !self.is_usable_at(now) {
            return Err(CheckoutError::InvalidCoupon(self.code.clone()));
        }
        let discount = self.discount_on(base);
        Ok(Quote {
            gross: base,
            discount,
            net: base.saturating_sub(discount).round_to_unit(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(CheckoutError::Validation("Coupon code must not be empty".to_string()));
        }
        Money::non_negative(self.value)?;
        if let Some(cap) = self.max_discount {
            Money::non_negative(cap.value())?;
        }
        if self.kind == DiscountKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(CheckoutError::Validation(format!(
                "Coupon {} grants more than 100%",
                self.code
            )));
        }
        Ok(())
    }
}
