use super::signature::{digest_matches, hmac_sha256_hex};
use super::transport::{HttpRequest, HttpTransportRef};
use super::{InboundCallback, Initiation, PaymentGateway, ensure_success, parse_json, trim_base};
use crate::domain::confirmation::{NormalizedConfirmation, OrderRef, Settlement, classify};
use crate::domain::order::{Order, OrderId};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "capture";
const SIGNATURE_HEADER: &str = "X-Signature";
const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
const PAID: &[&str] = &["COMPLETED", "CAPTURED"];
const PENDING: &[&str] = &["PENDING", "APPROVED", "CREATED"];

#[derive(Debug, Clone)]
pub struct ServerCaptureConfig {
    pub base_url: String,
    pub api_secret: String,
    pub webhook_secret: String,
    pub currency: String,
}

/// Provider order created server-side, approved in a client SDK, captured by us.
pub struct ServerCaptureGateway {
    config: ServerCaptureConfig,
    transport: HttpTransportRef,
}

#[derive(Serialize)]
struct CreateOrder<'a> {
    reference_id: &'a str,
    amount_minor: i64,
    currency: &'a str,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Deserialize)]
struct CaptureResult {
    id: String,
    status: String,
    amount_minor: Option<i64>,
    capture_id: Option<String>,
}

#[derive(Deserialize)]
struct CaptureRequest {
    provider_order_id: String,
}

#[derive(Deserialize)]
struct WebhookEvent {
    event_type: String,
    resource: WebhookResource,
}

#[derive(Deserialize)]
struct WebhookResource {
    order_id: String,
    reference_id: Option<String>,
    capture_id: Option<String>,
    status: String,
    amount_minor: Option<i64>,
}

impl ServerCaptureGateway {
    pub fn new(config: ServerCaptureConfig, transport: HttpTransportRef) -> Self {
        Self { config, transport }
    }

    fn signed(&self, request: HttpRequest, path: &str) -> Result<HttpRequest> {
        let body = request.body.as_deref().unwrap_or_default();
        let mut canonical = format!("{}\n{}\n", request.method.as_str(), path).into_bytes();
        canonical.extend_from_slice(body);
        let signature = hmac_sha256_hex(self.config.api_secret.as_bytes(), &canonical)?;
        Ok(request.header(SIGNATURE_HEADER, signature))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", trim_base(&self.config.base_url), path)
    }

    /// Provider order id from a JSON body, or the `token` query parameter of a return URL.
    fn capture_target(callback: &InboundCallback) -> Result<String> {
        if let Ok(request) = serde_json::from_slice::<CaptureRequest>(&callback.body) {
            return Ok(request.provider_order_id);
        }
        callback.param("token").ok_or_else(|| {
            CheckoutError::MalformedPayload(format!("{} capture names no provider order", NAME))
        })
    }
}

#[async_trait]
impl PaymentGateway for ServerCaptureGateway {
    fn name(&self) -> &str {
        NAME
    }

    async fn initiate(&self, order: &Order) -> Result<Initiation> {
        let amount_minor = order.net_amount.to_minor()?;
        let body = serde_json::to_vec(&CreateOrder {
            reference_id: &order.id.merchant_txn_id(),
            amount_minor,
            currency: &self.config.currency,
        })?;
        let path = "/v2/orders";
        let request = self.signed(HttpRequest::post_json(self.url(path), body), path)?;
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;

        let created: CreatedOrder = parse_json(NAME, &response.body)?;
        Ok(Initiation::ProviderOrder {
            provider_order_id: created.id,
            amount_minor,
            currency: self.config.currency.clone(),
            client_key: None,
        })
    }

    async fn confirm(&self, provider_reference: &str) -> Result<NormalizedConfirmation> {
        let path = format!("/v2/orders/{}/capture", provider_reference);
        let request = self.signed(
            HttpRequest::post_json(self.url(&path), b"{}".to_vec()),
            &path,
        )?;
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;

        let captured: CaptureResult = parse_json(NAME, &response.body)?;
        if captured.id != provider_reference {
            return Err(CheckoutError::MalformedPayload(format!(
                "{} capture answered for order {}",
                NAME, captured.id
            )));
        }
        Ok(NormalizedConfirmation::new(
            classify(&captured.status, PAID, PENDING),
            captured.status,
            captured.amount_minor,
            captured.capture_id,
        ))
    }

    async fn capture(&self, callback: &InboundCallback) -> Result<Settlement> {
        let provider_order_id = Self::capture_target(callback)?;
        let confirmation = self.confirm(&provider_order_id).await?;
        Ok(Settlement {
            order: OrderRef::Provider(provider_order_id.clone()),
            provider_order_id: Some(provider_order_id),
            confirmation,
        })
    }

    async fn webhook(&self, callback: &InboundCallback) -> Result<Settlement> {
        let provided = callback.signature_header(WEBHOOK_SIGNATURE_HEADER, NAME)?;
        let expected = hmac_sha256_hex(self.config.webhook_secret.as_bytes(), &callback.body)?;
        if !digest_matches(&expected, provided) {
            return Err(CheckoutError::SignatureInvalid(NAME.to_string()));
        }

        let event: WebhookEvent = parse_json(NAME, &callback.body)?;
        tracing::debug!(gateway = NAME, event_type = %event.event_type, "Webhook authenticated");
        let resource = event.resource;
        let order = match &resource.reference_id {
            Some(reference) => OrderRef::Merchant(OrderId::from_merchant_txn_id(reference)?),
            None => OrderRef::Provider(resource.order_id.clone()),
        };
        Ok(Settlement {
            order,
            provider_order_id: Some(resource.order_id),
            confirmation: NormalizedConfirmation::new(
                classify(&resource.status, PAID, PENDING),
                resource.status,
                resource.amount_minor,
                resource.capture_id,
            ),
        })
    }
}
