use super::signature::{salted_checksum, verify_salted_checksum};
use super::transport::{HttpRequest, HttpTransportRef};
use super::{InboundCallback, Initiation, PaymentGateway, ensure_success, parse_json, trim_base};
use crate::domain::confirmation::{NormalizedConfirmation, Settlement, classify};
use crate::domain::order::{Order, OrderId};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "redirect";
const PAY_PATH: &str = "/pg/v1/pay";
const VERIFY_HEADER: &str = "X-VERIFY";
const PAID: &[&str] = &["PAYMENT_SUCCESS"];
const PENDING: &[&str] = &["PAYMENT_PENDING"];

#[derive(Debug, Clone)]
pub struct RedirectConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: String,
    /// Where the provider sends the purchaser back to (our capture route).
    pub redirect_url: String,
    /// Where the provider posts server-to-server notifications (our webhook route).
    pub callback_url: String,
}

/// Hosted payment page flow authenticated with a salted SHA-256 checksum.
///
/// The purchaser is redirected to the provider; the return trip is never trusted
/// on its own and always triggers a status query.
pub struct RedirectGateway {
    config: RedirectConfig,
    transport: HttpTransportRef,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    amount: i64,
    redirect_url: &'a str,
    redirect_mode: &'static str,
    callback_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<&'a str>,
    payment_instrument: PaymentInstrument,
}

#[derive(Serialize)]
struct PaymentInstrument {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<PayData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Deserialize)]
struct RedirectInfo {
    url: String,
}

/// Shared by the status API and the decoded webhook body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    code: String,
    data: Option<StatusData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    merchant_id: Option<String>,
    merchant_transaction_id: String,
    transaction_id: Option<String>,
    amount: Option<i64>,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    response: String,
}

impl RedirectGateway {
    pub fn new(config: RedirectConfig, transport: HttpTransportRef) -> Self {
        Self { config, transport }
    }

    fn checksum(&self, payload: &str) -> String {
        salted_checksum(payload, &self.config.salt_key, &self.config.salt_index)
    }

    fn normalize(&self, status: StatusResponse) -> Result<(OrderId, NormalizedConfirmation)> {
        let data = status.data.ok_or_else(|| {
            CheckoutError::MalformedPayload(format!("{} status carries no data", NAME))
        })?;
        if let Some(merchant_id) = &data.merchant_id
            && merchant_id != &self.config.merchant_id
        {
            return Err(CheckoutError::MalformedPayload(format!(
                "{} status for foreign merchant {}",
                NAME, merchant_id
            )));
        }
        let order_id = OrderId::from_merchant_txn_id(&data.merchant_transaction_id)?;
        let confirmation = NormalizedConfirmation::new(
            classify(&status.code, PAID, PENDING),
            status.code,
            data.amount,
            data.transaction_id,
        );
        Ok((order_id, confirmation))
    }
}

#[async_trait]
impl PaymentGateway for RedirectGateway {
    fn name(&self) -> &str {
        NAME
    }

    async fn initiate(&self, order: &Order) -> Result<Initiation> {
        let merchant_txn_id = order.id.merchant_txn_id();
        let payload = PayRequest {
            merchant_id: &self.config.merchant_id,
            merchant_transaction_id: &merchant_txn_id,
            merchant_user_id: order.purchaser.as_deref().unwrap_or("guest"),
            amount: order.net_amount.to_minor()?,
            redirect_url: &self.config.redirect_url,
            redirect_mode: "POST",
            callback_url: &self.config.callback_url,
            mobile_number: order.contact.as_ref().and_then(|c| c.phone.as_deref()),
            payment_instrument: PaymentInstrument { kind: "PAY_PAGE" },
        };
        let encoded = STANDARD.encode(serde_json::to_vec(&payload)?);
        let checksum = self.checksum(&format!("{}{}", encoded, PAY_PATH));
        let body = serde_json::to_vec(&serde_json::json!({ "request": encoded }))?;

        let url = format!("{}{}", trim_base(&self.config.base_url), PAY_PATH);
        let request = HttpRequest::post_json(url, body).header(VERIFY_HEADER, checksum);
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;

        let parsed: PayResponse = parse_json(NAME, &response.body)?;
        let redirect_url = parsed
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .filter(|_| parsed.success);
        match redirect_url {
            Some(redirect_url) => Ok(Initiation::Redirect {
                redirect_url,
                provider_txn_id: merchant_txn_id,
            }),
            None => {
                let raw = response.text();
                tracing::warn!(gateway = NAME, raw = %raw, "Provider declined payment initiation");
                Err(CheckoutError::GatewayRejected {
                    gateway: NAME.to_string(),
                    status: Some(response.status),
                    raw,
                })
            }
        }
    }

    async fn confirm(&self, provider_reference: &str) -> Result<NormalizedConfirmation> {
        let path = format!(
            "/pg/v1/status/{}/{}",
            self.config.merchant_id, provider_reference
        );
        let url = format!("{}{}", trim_base(&self.config.base_url), path);
        let request = HttpRequest::get(url)
            .header(VERIFY_HEADER, self.checksum(&path))
            .header("X-MERCHANT-ID", self.config.merchant_id.as_str());
        let response = self.transport.send(request).await?;
        ensure_success(NAME, &response)?;

        let (order_id, confirmation) = self.normalize(parse_json(NAME, &response.body)?)?;
        if order_id.merchant_txn_id() != provider_reference {
            return Err(CheckoutError::MalformedPayload(format!(
                "{} status answered for a different transaction",
                NAME
            )));
        }
        Ok(confirmation)
    }

    async fn capture(&self, callback: &InboundCallback) -> Result<Settlement> {
        let merchant_txn_id = callback.param("transactionId").ok_or_else(|| {
            CheckoutError::MalformedPayload("Redirect return carries no transactionId".to_string())
        })?;
        let order_id = OrderId::from_merchant_txn_id(&merchant_txn_id)?;
        let confirmation = self.confirm(&merchant_txn_id).await?;
        Ok(Settlement::for_order(order_id, confirmation))
    }

    async fn webhook(&self, callback: &InboundCallback) -> Result<Settlement> {
        let header = callback.signature_header(VERIFY_HEADER, NAME)?;
        let envelope: WebhookEnvelope = parse_json(NAME, &callback.body)?;
        if !verify_salted_checksum(
            &envelope.response,
            &self.config.salt_key,
            &self.config.salt_index,
            header,
        ) {
            return Err(CheckoutError::SignatureInvalid(NAME.to_string()));
        }

        let decoded = STANDARD.decode(envelope.response.as_bytes()).map_err(|e| {
            CheckoutError::MalformedPayload(format!("{} webhook is not base64: {}", NAME, e))
        })?;
        let (order_id, confirmation) = self.normalize(parse_json(NAME, &decoded)?)?;
        Ok(Settlement::for_order(order_id, confirmation))
    }
}
