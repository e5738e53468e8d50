use crate::error::{CheckoutError, Result};
use crate::gateway::transport::{HttpTransportRef, ReqwestTransport};
use crate::gateway::{
    ClientReceiptConfig, ClientReceiptGateway, GatewayRegistry, RedirectConfig, RedirectGateway,
    ServerCaptureConfig, ServerCaptureGateway, client_receipt, redirect, server_capture,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Process configuration, read from the environment (and `.env` when present).
///
/// A gateway is enabled only when every one of its variables is set. A
/// partially configured gateway is an error rather than a silently missing
/// payment method.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub public_url: String,
    pub currency: String,
    pub gateway_timeout: Duration,
    pub redirect: Option<RedirectConfig>,
    pub capture: Option<ServerCaptureConfig>,
    pub receipt: Option<ClientReceiptConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bind = get("CHECKOUT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let public_url = get("CHECKOUT_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}", bind))
            .trim_end_matches('/')
            .to_string();
        let currency = get("CHECKOUT_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let gateway_timeout = match get("CHECKOUT_GATEWAY_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| {
                CheckoutError::Validation(format!(
                    "Invalid CHECKOUT_GATEWAY_TIMEOUT_SECS {}: {}",
                    raw, e
                ))
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let redirect = gateway_block(
            &get,
            &[
                "REDIRECT_GATEWAY_BASE_URL",
                "REDIRECT_GATEWAY_MERCHANT_ID",
                "REDIRECT_GATEWAY_SALT_KEY",
                "REDIRECT_GATEWAY_SALT_INDEX",
            ],
        )?
        .map(|[base_url, merchant_id, salt_key, salt_index]| RedirectConfig {
            base_url,
            merchant_id,
            salt_key,
            salt_index,
            redirect_url: format!("{}/checkout/{}/capture", public_url, redirect::NAME),
            callback_url: format!("{}/checkout/{}/webhook", public_url, redirect::NAME),
        });

        let capture = gateway_block(
            &get,
            &[
                "CAPTURE_GATEWAY_BASE_URL",
                "CAPTURE_GATEWAY_API_SECRET",
                "CAPTURE_GATEWAY_WEBHOOK_SECRET",
            ],
        )?
        .map(|[base_url, api_secret, webhook_secret]| ServerCaptureConfig {
            base_url,
            api_secret,
            webhook_secret,
            currency: currency.clone(),
        });

        let receipt = gateway_block(
            &get,
            &[
                "RECEIPT_GATEWAY_BASE_URL",
                "RECEIPT_GATEWAY_KEY_ID",
                "RECEIPT_GATEWAY_KEY_SECRET",
                "RECEIPT_GATEWAY_WEBHOOK_SECRET",
            ],
        )?
        .map(|[base_url, key_id, key_secret, webhook_secret]| ClientReceiptConfig {
            base_url,
            key_id,
            key_secret,
            webhook_secret,
            currency: currency.clone(),
        });

        Ok(Self {
            bind,
            public_url,
            currency,
            gateway_timeout,
            redirect,
            capture,
            receipt,
        })
    }

    /// Registers every configured gateway over a real HTTP client.
    pub fn gateways(&self) -> Result<GatewayRegistry> {
        let transport: HttpTransportRef = Arc::new(ReqwestTransport::new(self.gateway_timeout)?);
        Ok(self.gateways_with(transport))
    }

    pub fn gateways_with(&self, transport: HttpTransportRef) -> GatewayRegistry {
        let mut registry = GatewayRegistry::new();
        if let Some(config) = &self.redirect {
            registry.register(Arc::new(RedirectGateway::new(config.clone(), transport.clone())));
        }
        if let Some(config) = &self.capture {
            registry.register(Arc::new(ServerCaptureGateway::new(
                config.clone(),
                transport.clone(),
            )));
        }
        if let Some(config) = &self.receipt {
            registry.register(Arc::new(ClientReceiptGateway::new(config.clone(), transport)));
        }
        if registry.names().is_empty() {
            tracing::warn!("No payment gateway configured; only zero-amount orders can complete");
        } else {
            tracing::info!(gateways = ?registry.names(), "Payment gateways configured");
        }
        registry
    }

    pub fn enabled_gateways(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.capture.is_some() {
            names.push(server_capture::NAME);
        }
        if self.receipt.is_some() {
            names.push(client_receipt::NAME);
        }
        if self.redirect.is_some() {
            names.push(redirect::NAME);
        }
        names
    }
}

/// All-or-nothing read of one gateway's variables.
fn gateway_block<const N: usize, G>(get: &G, names: &[&str; N]) -> Result<Option<[String; N]>>
where
    G: Fn(&str) -> Option<String>,
{
    let values = (*names).map(|name| get(name));
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if let Some(missing) = names.iter().zip(&values).find(|(_, v)| v.is_none()) {
        return Err(CheckoutError::Validation(format!(
            "Missing environment variable '{}'",
            missing.0
        )));
    }
    Ok(Some(values.map(Option::unwrap_or_default)))
}
