use super::signature::{digest_matches, hmac_sha256_hex};
use super::transport::{HttpRequest, HttpTransportRef};
use super::{InboundCallback, Initiation, PaymentGateway, ensure_success, parse_json, trim_base};
use crate::domain::confirmation::{NormalizedConfirmation, OrderRef, Settlement, classify};
use crate::domain::order::{Order, OrderId};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "receipt";
const WEBHOOK_SIGNATURE_HEADER: &str = "X-Receipt-Signature";
const PAID: &[&str] = &["captured", "authorized", "paid"];
const PENDING: &[&str] = &["created"];

#[derive(Debug, Clone)]
pub struct ClientReceiptConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub currency: String,
}

/// Client SDK checkout that hands back a signed receipt
/// (`provider order id | payment id`, HMAC'd with the key secret).
pub struct ClientReceiptGateway {
    config: ClientReceiptConfig,
    transport: HttpTransportRef,
}

#[derive(Serialize)]
struct CreateOrder<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: Notes,
}

#[derive(Serialize, Deserialize, Default)]
struct Notes {
    #[serde(default)]
    merchant_txn_id: Option<String>,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Deserialize)]
struct Receipt {
    merchant_txn_id: String,
    provider_order_id: String,
    payment_id: String,
    signature: String,
}

#[derive(Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
    amount: Option<i64>,
    status: String,
    #[serde(default)]
    notes: Notes,
}

#[derive(Deserialize)]
struct WebhookEvent {
    event: String,
    payload: WebhookPayload,
}

#[derive(Deserialize)]
struct WebhookPayload {
    payment: WebhookPayment,
}

#[derive(Deserialize)]
struct WebhookPayment {
    entity: PaymentEntity,
}

impl PaymentEntity {
    fn into_confirmation(self) -> NormalizedConfirmation {
        NormalizedConfirmation::new(
            classify(&self.status, PAID, PENDING),
            self.status,
            self.amount,
            Some(self.id),
        )
    }
}

impl ClientReceiptGateway {
    pub fn new(config: ClientReceiptConfig, transport: HttpTransportRef) -> Self {
        Self { config, transport }
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        let credentials = STANDARD.encode(format!("{}:{}", self.config.key_id, self.config.key_secret));
        request.header("Authorization", format!("Basic {}", credentials))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", trim_base(&self.config.base_url), path)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentEntity> {
        let request = self.authorized(HttpRequest::get(self.url(&format!("/v1/payments/{}", payment_id))));
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;
        let payment: PaymentEntity = parse_json(NAME, &response.body)?;
        if payment.id != payment_id {
            return Err(CheckoutError::MalformedPayload(format!(
                "{} answered for payment {}",
                NAME, payment.id
            )));
        }
        Ok(payment)
    }
}

#[async_trait]
impl PaymentGateway for ClientReceiptGateway {
    fn name(&self) -> &str {
        NAME
    }

    async fn initiate(&self, order: &Order) -> Result<Initiation> {
        let amount_minor = order.net_amount.to_minor()?;
        let body = serde_json::to_vec(&CreateOrder {
            amount: amount_minor,
            currency: &self.config.currency,
            receipt: &order.number.0,
            notes: Notes {
                merchant_txn_id: Some(order.id.merchant_txn_id()),
            },
        })?;
        let request = self.authorized(HttpRequest::post_json(self.url("/v1/orders"), body));
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;

        let created: CreatedOrder = parse_json(NAME, &response.body)?;
        Ok(Initiation::ProviderOrder {
            provider_order_id: created.id,
            amount_minor,
            currency: self.config.currency.clone(),
            client_key: Some(self.config.key_id.clone()),
        })
    }

    async fn confirm(&self, provider_reference: &str) -> Result<NormalizedConfirmation> {
        Ok(self.fetch_payment(provider_reference).await?.into_confirmation())
    }

    async fn capture(&self, callback: &InboundCallback) -> Result<Settlement> {
        let receipt: Receipt = parse_json(NAME, &callback.body)?;
        let signed = format!("{}|{}", receipt.provider_order_id, receipt.payment_id);
        let expected = hmac_sha256_hex(self.config.key_secret.as_bytes(), signed.as_bytes())?;
        if !digest_matches(&expected, &receipt.signature) {
            return Err(CheckoutError::SignatureInvalid(NAME.to_string()));
        }

        let order_id = OrderId::from_merchant_txn_id(&receipt.merchant_txn_id)?;
        let payment = self.fetch_payment(&receipt.payment_id).await?;
        if payment.order_id != receipt.provider_order_id {
            return Err(CheckoutError::MalformedPayload(format!(
                "Payment {} does not belong to provider order {}",
                payment.id, receipt.provider_order_id
            )));
        }
        Ok(Settlement {
            order: OrderRef::Merchant(order_id),
            provider_order_id: Some(receipt.provider_order_id),
            confirmation: payment.into_confirmation(),
        })
    }

    async fn webhook(&self, callback: &InboundCallback) -> Result<Settlement> {
        let provided = callback.signature_header(WEBHOOK_SIGNATURE_HEADER, NAME)?;
        let expected = hmac_sha256_hex(self.config.webhook_secret.as_bytes(), &callback.body)?;
        if !digest_matches(&expected, provided) {
            return Err(CheckoutError::SignatureInvalid(NAME.to_string()));
        }

        let event: WebhookEvent = parse_json(NAME, &callback.body)?;
        tracing::debug!(gateway = NAME, event = %event.event, "Webhook authenticated");
        let mut entity = event.payload.payment.entity;
        let order = match entity.notes.merchant_txn_id.take() {
            Some(reference) => OrderRef::Merchant(OrderId::from_merchant_txn_id(&reference)?),
            None => OrderRef::Provider(entity.order_id.clone()),
        };
        Ok(Settlement {
            order,
            provider_order_id: Some(entity.order_id.clone()),
            confirmation: entity.into_confirmation(),
        })
    }
}
