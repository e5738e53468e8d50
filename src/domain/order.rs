use super::coupon::Quote;
use super::money::Money;
use super::resource::{Reservation, ResourceRef};
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Prefix of the merchant transaction id sent to providers.
pub const MERCHANT_TXN_PREFIX: &str = "MT";

/// Opaque order identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Ulid);

impl OrderId {
    pub fn new(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Encodes the id for providers that cap the merchant transaction id length.
    ///
    /// `MT` followed by the 26-character ULID: 28 characters of `[0-9A-Z]`.
    pub fn merchant_txn_id(&self) -> String {
        format!("{}{}", MERCHANT_TXN_PREFIX, self.0)
    }

    /// Inverse of [`OrderId::merchant_txn_id`].
    pub fn from_merchant_txn_id(value: &str) -> Result<Self> {
        let raw = value.strip_prefix(MERCHANT_TXN_PREFIX).ok_or_else(|| {
            CheckoutError::MalformedPayload(format!("Unrecognised merchant transaction id: {}", value))
        })?;
        raw.parse()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| CheckoutError::MalformedPayload(format!("Invalid order id {}: {}", s, e)))
    }
}

/// Short, human-facing order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Created => f.write_str("created"),
            OrderStatus::Confirmed => f.write_str("confirmed"),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Paid => f.write_str("paid"),
            PaymentStatus::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Contact {
    pub fn validate(&self) -> Result<()> {
        if let Some(phone) = &self.phone {
            let digits = phone.strip_prefix('+').unwrap_or(phone);
            if !(10..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(CheckoutError::Validation(format!("Invalid phone number: {}", phone)));
            }
        }
        if let Some(email) = &self.email
            && !email.split_once('@').is_some_and(|(user, host)| {
                !user.is_empty() && host.contains('.') && !host.starts_with('.')
            })
        {
            return Err(CheckoutError::Validation(format!("Invalid email: {}", email)));
        }
        Ok(())
    }
}

/// The durable record of one purchase attempt and its settlement.
///
/// Created by the order store at purchase time; afterwards only
/// [`Order::settle`] (driven by the reconciler) moves its status fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: OrderNumber,
    pub resource: ResourceRef,
    pub gross_amount: Money,
    pub discount: Money,
    pub net_amount: Money,
    pub gateway: String,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub purchaser: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Provider-issued transaction or order id, set at initiation.
    #[serde(default)]
    pub provider_txn_id: Option<String>,
    /// Provider payment reference, set only on confirmation.
    #[serde(default)]
    pub payment_reference_id: Option<String>,
    #[serde(default)]
    pub amount_paid: Option<Money>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub reservation: Option<Reservation>,
    pub created_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

/// A terminal move of the payment axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Paid {
        reference: String,
        amount_paid: Money,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
    },
    Failed {
        remark: String,
    },
}

/// Fields of a new order, supplied by the checkout service.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub resource: ResourceRef,
    pub quote: Quote,
    pub gateway: String,
    pub contact: Option<Contact>,
    pub purchaser: Option<String>,
    pub coupon_code: Option<String>,
}

impl Order {
    pub fn new(id: OrderId, number: OrderNumber, new: NewOrder, now: DateTime<Utc>) -> Self {
        let reservation = new.resource.reservation();
        Self {
            id,
            number,
            resource: new.resource,
            gross_amount: new.quote.gross,
            discount: new.quote.discount,
            net_amount: new.quote.net,
            gateway: new.gateway,
            contact: new.contact,
            purchaser: new.purchaser,
            coupon_code: new.coupon_code,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            provider_txn_id: None,
            payment_reference_id: None,
            amount_paid: None,
            remark: None,
            reservation,
            created_at: now,
            valid_from: now,
            valid_to: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.payment_status.is_terminal()
    }

    /// Applies a terminal transition if the payment is still pending.
    ///
    /// Returns the reservation that must be handed back to inventory, if any.
    /// A settled order is left untouched and reported as `ReconciliationConflict`.
    pub fn settle(&mut self, transition: &Transition) -> Result<Option<Reservation>> {
        if self.is_settled() {
            return Err(CheckoutError::ReconciliationConflict(Box::new(self.clone())));
        }
        match transition {
            Transition::Paid {
                reference,
                amount_paid,
                valid_from,
                valid_to,
            } => {
                if valid_to < valid_from {
                    return Err(CheckoutError::Validation(format!(
                        "Validity window of order {} ends before it starts",
                        self.id
                    )));
                }
                self.payment_status = PaymentStatus::Paid;
                self.status = OrderStatus::Confirmed;
                self.payment_reference_id = Some(reference.clone());
                self.amount_paid = Some(*amount_paid);
                self.valid_from = *valid_from;
                self.valid_to = Some(*valid_to);
                Ok(None)
            }
            Transition::Failed { remark } => {
                self.payment_status = PaymentStatus::Failed;
                self.append_remark(remark);
                Ok(self.release_reservation())
            }
        }
    }

    /// Marks the reservation released and returns it, at most once.
    fn release_reservation(&mut self) -> Option<Reservation> {
        match &mut self.reservation {
            Some(reservation) if !reservation.released => {
                reservation.released = true;
                Some(reservation.clone())
            }
            _ => None,
        }
    }

    /// Whether `remark` is already one of the `; `-separated remark entries.
    pub fn has_remark(&self, remark: &str) -> bool {
        self.remark
            .as_deref()
            .is_some_and(|existing| existing.split("; ").any(|entry| entry == remark))
    }

    /// Appends a remark entry; an entry already present is not repeated.
    pub fn append_remark(&mut self, remark: &str) {
        if self.has_remark(remark) {
            return;
        }
        self.remark = Some(match self.remark.take() {
            Some(existing) if !existing.is_empty() => format!("{}; {}", existing, remark),
            _ => remark.to_string(),
        });
    }

    /// Records the provider correlation id while the payment is pending.
    pub fn record_initiation(&mut self, provider_txn_id: &str) -> Result<()> {
        if self.is_settled() {
            return Err(CheckoutError::ReconciliationConflict(Box::new(self.clone())));
        }
        self.provider_txn_id = Some(provider_txn_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn order(resource: ResourceRef) -> Order {
        Order::new(
            OrderId::new(Ulid::new()),
            OrderNumber("ORD1".to_string()),
            NewOrder {
                resource,
                quote: Quote::full_price(Money::new(dec!(500))),
                gateway: "redirect".to_string(),
                contact: None,
                purchaser: None,
                coupon_code: None,
            },
            now(),
        )
    }

    fn paid() -> Transition {
        Transition::Paid {
            reference: "pay_1".to_string(),
            amount_paid: Money::new(dec!(500)),
            valid_from: now(),
            valid_to: now() + Duration::days(30),
        }
    }

    #[test]
    fn test_merchant_txn_id_round_trip() {
        let id = OrderId::new(Ulid::new());
        let encoded = id.merchant_txn_id();
        assert_eq!(encoded.len(), 28);
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(OrderId::from_merchant_txn_id(&encoded).unwrap(), id);
    }

    #[test]
    fn test_merchant_txn_id_rejects_foreign_values() {
        assert!(matches!(
            OrderId::from_merchant_txn_id("TX123"),
            Err(CheckoutError::MalformedPayload(_))
        ));
        assert!(OrderId::from_merchant_txn_id("MTnot-a-ulid").is_err());
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = order(ResourceRef::plan("gold"));
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.valid_from, now());
        assert!(order.valid_to.is_none());
        assert!(order.reservation.is_none());
    }

    #[test]
    fn test_settle_paid_confirms() {
        let mut order = order(ResourceRef::plan("gold"));
        assert!(order.settle(&paid()).unwrap().is_none());
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.valid_to.unwrap() >= order.valid_from);
        assert_eq!(order.payment_reference_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_settle_is_terminal() {
        let mut order = order(ResourceRef::plan("gold"));
        order.settle(&paid()).unwrap();
        let err = order
            .settle(&Transition::Failed {
                remark: "declined".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ReconciliationConflict(_)));
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_failed_releases_reservation_once() {
        let mut order = order(ResourceRef::seats("bus-42", 2));
        let released = order
            .settle(&Transition::Failed {
                remark: "PAYMENT_ERROR".to_string(),
            })
            .unwrap()
            .unwrap();
        assert_eq!(released.quantity, 2);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert!(order.reservation.as_ref().unwrap().released);
        assert!(order.release_reservation().is_none());
    }

    #[test]
    fn test_paid_rejects_inverted_window() {
        let mut order = order(ResourceRef::plan("gold"));
        let transition = Transition::Paid {
            reference: "pay_1".to_string(),
            amount_paid: Money::new(dec!(500)),
            valid_from: now(),
            valid_to: now() - Duration::days(1),
        };
        assert!(matches!(
            order.settle(&transition),
            Err(CheckoutError::Validation(_))
        ));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_remarks_accumulate() {
        let mut order = order(ResourceRef::plan("gold"));
        order.append_remark("first");
        order.append_remark("second");
        order.append_remark("first");
        assert_eq!(order.remark.as_deref(), Some("first; second"));
        assert!(order.has_remark("second"));
        assert!(!order.has_remark("sec"));
    }

    #[test]
    fn test_contact_validation() {
        let ok = Contact {
            phone: Some("+919876543210".to_string()),
            email: Some("rider@example.com".to_string()),
        };
        assert!(ok.validate().is_ok());

        let bad_phone = Contact {
            phone: Some("12ab".to_string()),
            email: None,
        };
        assert!(bad_phone.validate().is_err());

        let bad_email = Contact {
            phone: None,
            email: Some("rider@localhost".to_string()),
        };
        assert!(bad_email.validate().is_err());
    }
}
