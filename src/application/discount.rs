use crate::domain::coupon::Quote;
use crate::domain::money::Money;
use crate::domain::ports::CouponRepositoryRef;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};

/// Prices a purchase, applying an optional coupon.
///
/// An unknown, inactive or expired coupon aborts with `InvalidCoupon`; there is no
/// silent fallback to full price.
#[derive(Clone)]
pub struct DiscountResolver {
    coupons: CouponRepositoryRef,
}

impl DiscountResolver {
    pub fn new(coupons: CouponRepositoryRef) -> Self {
        Self { coupons }
    }

    pub async fn resolve(
        &self,
        base: Money,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let Some(code) = coupon_code.map(str::trim).filter(|code| !code.is_empty()) else {
            return Ok(Quote::full_price(base));
        };
        let coupon = self
            .coupons
            .find(code)
            .await?
            .ok_or_else(|| CheckoutError::InvalidCoupon(code.to_string()))?;
        let quote = coupon.apply(base, now)?;
        tracing::debug!(code, gross = %quote.gross, discount = %quote.discount, "Coupon applied");
        Ok(quote)
    }
}
