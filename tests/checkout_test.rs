mod common;

use checkout_engine::application::checkout::PlaceOrder;
use checkout_engine::domain::money::Money;
use checkout_engine::domain::order::{OrderStatus, PaymentStatus};
use checkout_engine::domain::ports::InventoryStore;
use checkout_engine::domain::resource::ResourceRef;
use checkout_engine::error::CheckoutError;
use checkout_engine::gateway::Initiation;
use common::*;
use rust_decimal_macros::dec;

fn request(resource: ResourceRef, coupon_code: Option<&str>) -> PlaceOrder {
    PlaceOrder {
        resource,
        gateway: "redirect".to_string(),
        coupon_code: coupon_code.map(str::to_string),
        contact: None,
        purchaser: None,
    }
}

#[tokio::test]
async fn test_percentage_coupon_is_capped() {
    let fixture = fixture().await;
    let quote = fixture
        .engine
        .checkout
        .quote(&ResourceRef::plan("gold"), Some("SAVE10"))
        .await
        .unwrap();
    assert_eq!(quote.gross, Money::new(dec!(1000)));
    assert_eq!(quote.discount, Money::new(dec!(80)));
    assert_eq!(quote.net, Money::new(dec!(920)));
}

#[tokio::test]
async fn test_oversized_fixed_coupon_makes_order_free() {
    let fixture = fixture().await;
    let outcome = fixture
        .engine
        .checkout
        .checkout(request(ResourceRef::plan("basic"), Some("BIG600")))
        .await
        .unwrap();

    assert_eq!(outcome.initiation, Initiation::Settled);
    assert_eq!(outcome.order.net_amount, Money::new(dec!(0)));
    assert_eq!(outcome.order.discount, Money::new(dec!(500)));
    assert_eq!(outcome.order.status, OrderStatus::Confirmed);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);
    let reference = format!("COMPLIMENTARY-{}", outcome.order.number);
    assert_eq!(outcome.order.payment_reference_id.as_deref(), Some(reference.as_str()));
    assert_eq!(fixture.transport.request_count(), 0);
    assert_eq!(fixture.notifier.count(), 1);
}

#[tokio::test]
async fn test_invalid_coupon_aborts_without_order() {
    let fixture = fixture().await;
    let result = fixture
        .engine
        .checkout
        .checkout(request(ResourceRef::seats("bus-42", 1), Some("save10")))
        .await;
    assert!(matches!(result, Err(CheckoutError::InvalidCoupon(_))));
    assert!(fixture.engine.orders().await.unwrap().is_empty());
    assert_eq!(fixture.store.resource("bus-42").await.unwrap().unwrap().available, 2);
}

#[tokio::test]
async fn test_unknown_gateway_and_resource() {
    let fixture = fixture().await;
    let mut unknown_gateway = request(ResourceRef::plan("gold"), None);
    unknown_gateway.gateway = "cash".to_string();
    assert!(matches!(
        fixture.engine.checkout.checkout(unknown_gateway).await,
        Err(CheckoutError::UnknownGateway(_))
    ));
    assert!(matches!(
        fixture
            .engine
            .checkout
            .checkout(request(ResourceRef::plan("platinum"), None))
            .await,
        Err(CheckoutError::UnknownResource(_))
    ));
    assert!(fixture.engine.orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_initiation_leaves_order_pending_for_retry() {
    let fixture = fixture().await;
    fixture.transport.respond(
        400,
        serde_json::json!({"success": false, "code": "BAD_REQUEST", "message": "invalid amount"}),
    );
    let order = fixture
        .engine
        .checkout
        .place_order(request(ResourceRef::seats("bus-42", 1), None))
        .await
        .unwrap();
    match fixture.engine.checkout.initiate(&order.id).await {
        Err(CheckoutError::GatewayRejected { gateway, status, raw }) => {
            assert_eq!(gateway, "redirect");
            assert_eq!(status, Some(400));
            assert!(raw.contains("invalid amount"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    fixture.transport.respond(200, redirect_pay_page());
    let outcome = fixture.engine.checkout.initiate(&order.id).await.unwrap();
    assert!(matches!(outcome.initiation, Initiation::Redirect { .. }));
    assert_eq!(outcome.order.payment_status, PaymentStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_for_last_seat() {
    let fixture = fixture().await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let checkout = fixture.engine.checkout.clone();
        handles.push(tokio::spawn(async move {
            checkout
                .place_order(request(ResourceRef::seats("bus-1", 1), None))
                .await
        }));
    }

    let mut placed = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientInventory { available, .. }) => {
                assert_eq!(available, 0);
                sold_out += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((placed, sold_out), (1, 1));
    assert_eq!(fixture.store.resource("bus-1").await.unwrap().unwrap().available, 0);
    assert_eq!(fixture.engine.orders().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_orders_never_oversell() {
    let fixture = fixture().await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let checkout = fixture.engine.checkout.clone();
        handles.push(tokio::spawn(async move {
            checkout
                .place_order(request(ResourceRef::seats("bus-42", 1), None))
                .await
                .is_ok()
        }));
    }
    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }
    assert_eq!(placed, 2);
    assert_eq!(fixture.store.resource("bus-42").await.unwrap().unwrap().available, 0);
}

#[tokio::test]
async fn test_cancel_restores_seats_once() {
    let fixture = fixture().await;
    let order = fixture
        .engine
        .checkout
        .place_order(request(ResourceRef::seats("bus-42", 2), None))
        .await
        .unwrap();

    let cancelled = fixture.engine.reconciler.cancel(&order.id, "abandoned").await.unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Failed);
    let again = fixture.engine.reconciler.cancel(&order.id, "abandoned").await.unwrap();
    assert_eq!(again, cancelled);
    assert_eq!(fixture.store.resource("bus-42").await.unwrap().unwrap().available, 2);
}
