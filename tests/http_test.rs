mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use checkout_engine::domain::ports::InventoryStore;
use checkout_engine::interfaces::http::router;
use common::*;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn seats_body(quantity: u32, coupon: Option<&str>) -> Value {
    json!({
        "resource": {"type": "seats", "resource_id": "bus-42", "quantity": quantity},
        "coupon_code": coupon,
        "contact": {"phone": "+919876543210"}
    })
}

#[tokio::test]
async fn test_health_lists_gateways() {
    let fixture = fixture().await;
    let app = router(fixture.engine);
    let (status, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["gateways"], json!(["capture", "receipt", "redirect"]));
}

#[tokio::test]
async fn test_checkout_redirect_then_webhook_then_lookup() {
    let fixture = fixture().await;
    fixture.transport.respond(200, redirect_pay_page());
    let app = router(fixture.engine.clone());

    let mut request = post_json("/checkout/redirect", seats_body(1, None));
    request
        .headers_mut()
        .insert("authorization", "Bearer tok-1".parse().unwrap());
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["initiation"]["next"], "redirect");
    assert_eq!(body["initiation"]["redirect_url"], "https://pg.redirect.test/pay/abc");
    assert_eq!(body["order"]["purchaser"], "user-1");
    assert_eq!(body["order"]["payment_status"], "pending");

    let order_id = body["order"]["id"].as_str().unwrap().to_string();
    let merchant_txn_id = format!("MT{}", order_id);
    let (payload, checksum) =
        redirect_webhook(&redirect_status("PAYMENT_SUCCESS", &merchant_txn_id, 25000, "T-1"));
    let mut webhook = post_json("/checkout/redirect/webhook", serde_json::from_str(&payload).unwrap());
    webhook
        .headers_mut()
        .insert("x-verify", checksum.parse().unwrap());
    let (status, body) = call(&app, webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], true);
    assert_eq!(body["payment_status"], "paid");

    let (status, body) = call(&app, get(&format!("/orders/{}", order_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["payment_reference_id"], "T-1");
}

#[tokio::test]
async fn test_redirect_return_via_query_string() {
    let fixture = fixture().await;
    fixture.transport.respond(200, redirect_pay_page());
    let outcome = fixture
        .engine
        .checkout
        .checkout(checkout_engine::application::checkout::PlaceOrder {
            resource: checkout_engine::domain::resource::ResourceRef::seats("bus-42", 1),
            gateway: "redirect".to_string(),
            coupon_code: None,
            contact: None,
            purchaser: None,
        })
        .await
        .unwrap();
    let merchant_txn_id = outcome.order.id.merchant_txn_id();
    fixture.transport.respond(
        200,
        redirect_status("PAYMENT_PENDING", &merchant_txn_id, 25000, "T-2"),
    );

    let app = router(fixture.engine);
    let uri = format!("/checkout/redirect/capture?transactionId={}", merchant_txn_id);
    let (status, body) = call(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "pending");
}

#[tokio::test]
async fn test_error_mapping() {
    let fixture = fixture().await;
    let app = router(fixture.engine);

    let mut bad_token = post_json("/checkout/redirect", seats_body(1, None));
    bad_token
        .headers_mut()
        .insert("authorization", "Bearer stolen".parse().unwrap());
    assert_eq!(
        call(&app, bad_token).await,
        (StatusCode::UNAUTHORIZED, json!({"error": "Unauthorized"}))
    );

    let (status, body) = call(&app, post_json("/checkout/redirect", seats_body(1, Some("NOPE")))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"error": "The coupon code is not valid"}));

    let (status, _) = call(&app, post_json("/checkout/cash", seats_body(1, None))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, post_json("/checkout/redirect", seats_body(3, None))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let malformed = Request::builder()
        .method("POST")
        .uri("/checkout/redirect")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid request"}));

    let (status, _) = call(&app, get("/orders/not-an-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gateway_outage_is_bad_gateway_without_detail() {
    let fixture = fixture().await;
    fixture
        .transport
        .respond(503, json!({"secret_detail": "merchant key disabled"}));
    let app = router(fixture.engine.clone());

    let (status, body) = call(&app, post_json("/checkout/redirect", seats_body(1, None))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.to_string().contains("merchant key disabled"));
}

#[tokio::test]
async fn test_failed_initiation_releases_seats() {
    let fixture = fixture().await;
    fixture.transport.respond(
        400,
        json!({"success": false, "code": "BAD_REQUEST", "message": "invalid amount"}),
    );
    let app = router(fixture.engine.clone());

    let (status, _) = call(&app, post_json("/checkout/redirect", seats_body(2, None))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(fixture.store.resource("bus-42").await.unwrap().unwrap().available, 2);

    let orders = fixture.engine.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_status, checkout_engine::domain::order::PaymentStatus::Failed);
    assert_eq!(orders[0].remark.as_deref(), Some("cancelled: initiation failed"));

    fixture.transport.respond(200, redirect_pay_page());
    let (status, _) = call(&app, post_json("/checkout/redirect", seats_body(2, None))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(fixture.store.resource("bus-42").await.unwrap().unwrap().available, 0);
}

#[tokio::test]
async fn test_forged_webhook_is_unauthorized() {
    let fixture = fixture().await;
    let app = router(fixture.engine);

    let body = json!({"event_type": "PAYMENT.CAPTURE.COMPLETED", "resource": {"order_id": "PO-1", "status": "COMPLETED"}});
    let mut request = post_json("/checkout/capture/webhook", body);
    request
        .headers_mut()
        .insert("x-webhook-signature", "deadbeef".parse().unwrap());
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized"}));

    let (status, _) = call(
        &app,
        post_json("/checkout/capture/webhook", json!({"resource": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
