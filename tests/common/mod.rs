#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use checkout_engine::application::engine::{CheckoutEngine, Collaborators};
use checkout_engine::domain::coupon::{Coupon, DiscountKind};
use checkout_engine::domain::money::Money;
use checkout_engine::domain::order::Order;
use checkout_engine::domain::ports::{Clock, InventoryStore, Notifier};
use checkout_engine::domain::resource::{CatalogItem, Resource};
use checkout_engine::error::Result;
use checkout_engine::gateway::signature::{hmac_sha256_hex, salted_checksum};
use checkout_engine::gateway::transport::{HttpRequest, HttpResponse, HttpTransport};
use checkout_engine::gateway::{
    ClientReceiptConfig, ClientReceiptGateway, GatewayRegistry, RedirectConfig, RedirectGateway,
    ServerCaptureConfig, ServerCaptureGateway,
};
use checkout_engine::infrastructure::catalog::{
    InMemoryCatalog, InMemoryCouponRepository, StaticSessions,
};
use checkout_engine::infrastructure::id::UlidGenerator;
use checkout_engine::infrastructure::in_memory::InMemoryStore;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SALT_KEY: &str = "salt-key";
pub const SALT_INDEX: &str = "1";
pub const MERCHANT_ID: &str = "MERCHANT1";
pub const CAPTURE_WEBHOOK_SECRET: &str = "capture-hook";
pub const RECEIPT_KEY_SECRET: &str = "receipt-secret";
pub const RECEIPT_WEBHOOK_SECRET: &str = "receipt-hook";

/// Provider stand-in: replays canned responses in order and records requests.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn respond(&self, status: u16, body: Value) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        });
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left"))
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub sent: AtomicUsize,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn order_confirmed(&self, _order: &Order) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Fixture {
    pub engine: CheckoutEngine,
    pub store: InMemoryStore,
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<CountingNotifier>,
    pub now: DateTime<Utc>,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

fn coupon(code: &str, kind: DiscountKind, value: rust_decimal::Decimal, cap: Option<Money>) -> Coupon {
    Coupon {
        code: code.to_string(),
        kind,
        value,
        max_discount: cap,
        is_active: true,
        valid_from: None,
        valid_to: None,
    }
}

/// Catalog: plan `gold` (1000, 30 days), plan `basic` (500, 7 days), one seat on
/// `bus-1` and two seats on `bus-42` (250 each). Coupons `SAVE10` (10% capped at
/// 80), `BIG600` (fixed 600). Session `tok-1` belongs to `user-1`.
pub async fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    store
        .put_resource(Resource::new("bus-1", 1, Money::new(dec!(250))))
        .await
        .unwrap();
    store
        .put_resource(Resource::new("bus-42", 2, Money::new(dec!(250))))
        .await
        .unwrap();

    let catalog = InMemoryCatalog::new();
    catalog
        .add_plan("gold", CatalogItem { unit_price: Money::new(dec!(1000)), validity_days: 30 })
        .await;
    catalog
        .add_plan("basic", CatalogItem { unit_price: Money::new(dec!(500)), validity_days: 7 })
        .await;
    for id in ["bus-1", "bus-42"] {
        catalog
            .add_resource(id, CatalogItem { unit_price: Money::new(dec!(250)), validity_days: 1 })
            .await;
    }

    let coupons = InMemoryCouponRepository::new();
    coupons
        .add(coupon("SAVE10", DiscountKind::Percentage, dec!(10), Some(Money::new(dec!(80)))))
        .await
        .unwrap();
    coupons
        .add(coupon("BIG600", DiscountKind::Fixed, dec!(600), None))
        .await
        .unwrap();

    let sessions = StaticSessions::new();
    sessions.insert("tok-1", "user-1").await;

    let transport = Arc::new(ScriptedTransport::default());
    let notifier = Arc::new(CountingNotifier::default());
    let now = now();

    let engine = CheckoutEngine::new(
        Collaborators {
            orders: Arc::new(store.clone()),
            catalog: Arc::new(catalog),
            coupons: Arc::new(coupons),
            notifier: notifier.clone(),
            identity: Arc::new(sessions),
            ids: Arc::new(UlidGenerator::new()),
            clock: Arc::new(FixedClock(now)),
        },
        gateways(transport.clone()),
    );

    Fixture {
        engine,
        store,
        transport,
        notifier,
        now,
    }
}

pub fn gateways(transport: Arc<ScriptedTransport>) -> GatewayRegistry {
    GatewayRegistry::new()
        .with(Arc::new(RedirectGateway::new(
            RedirectConfig {
                base_url: "https://pg.redirect.test".to_string(),
                merchant_id: MERCHANT_ID.to_string(),
                salt_key: SALT_KEY.to_string(),
                salt_index: SALT_INDEX.to_string(),
                redirect_url: "https://shop.test/checkout/redirect/capture".to_string(),
                callback_url: "https://shop.test/checkout/redirect/webhook".to_string(),
            },
            transport.clone(),
        )))
        .with(Arc::new(ServerCaptureGateway::new(
            ServerCaptureConfig {
                base_url: "https://api.capture.test".to_string(),
                api_secret: "capture-api".to_string(),
                webhook_secret: CAPTURE_WEBHOOK_SECRET.to_string(),
                currency: "INR".to_string(),
            },
            transport.clone(),
        )))
        .with(Arc::new(ClientReceiptGateway::new(
            ClientReceiptConfig {
                base_url: "https://api.receipt.test".to_string(),
                key_id: "key-1".to_string(),
                key_secret: RECEIPT_KEY_SECRET.to_string(),
                webhook_secret: RECEIPT_WEBHOOK_SECRET.to_string(),
                currency: "INR".to_string(),
            },
            transport,
        )))
}

/// Successful pay-page response for the redirect gateway.
pub fn redirect_pay_page() -> Value {
    serde_json::json!({
        "success": true,
        "code": "PAYMENT_INITIATED",
        "data": {
            "instrumentResponse": {
                "redirectInfo": { "url": "https://pg.redirect.test/pay/abc" }
            }
        }
    })
}

/// Status body as returned by the redirect gateway's status API and inside its webhooks.
pub fn redirect_status(code: &str, merchant_txn_id: &str, amount: i64, txn: &str) -> Value {
    serde_json::json!({
        "success": code == "PAYMENT_SUCCESS",
        "code": code,
        "data": {
            "merchantId": MERCHANT_ID,
            "merchantTransactionId": merchant_txn_id,
            "transactionId": txn,
            "amount": amount
        }
    })
}

/// Webhook body plus its `X-VERIFY` header value.
pub fn redirect_webhook(status: &Value) -> (String, String) {
    let encoded = STANDARD.encode(status.to_string());
    let checksum = salted_checksum(&encoded, SALT_KEY, SALT_INDEX);
    (serde_json::json!({ "response": encoded }).to_string(), checksum)
}

pub fn hmac(secret: &str, body: &str) -> String {
    hmac_sha256_hex(secret.as_bytes(), body.as_bytes()).unwrap()
}
