use super::{ApiError, AppState, json_error};
use crate::application::checkout::PlaceOrder;
use crate::application::ingress::WebhookOutcome;
use crate::domain::order::{Contact, OrderId};
use crate::domain::resource::ResourceRef;
use crate::error::CheckoutError;
use crate::gateway::InboundCallback;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::collections::HashMap;

/// Body of `POST /checkout/{gateway}`.
#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    resource: ResourceRef,
    #[serde(default)]
    coupon_code: Option<String>,
    #[serde(default)]
    contact: Option<Contact>,
}

pub(super) async fn handle_health(State(engine): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "gateways": engine.checkout.gateways().names(),
    }))
    .into_response()
}

pub(super) async fn handle_checkout(
    State(engine): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let purchaser = match bearer_token(&headers)? {
        Some(token) => Some(engine.purchaser(token).await?),
        None => None,
    };
    let request: CheckoutRequest = serde_json::from_slice(&body)
        .map_err(|e| CheckoutError::MalformedPayload(format!("Invalid checkout request: {}", e)))?;

    let outcome = engine
        .checkout
        .checkout(PlaceOrder {
            resource: request.resource,
            gateway,
            coupon_code: request.coupon_code,
            contact: request.contact,
            purchaser,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub(super) async fn handle_capture(
    State(engine): State<AppState>,
    Path(gateway): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let callback = inbound(query, &headers, body);
    let order = engine.ingress.capture(&gateway, &callback).await?;
    Ok(Json(order).into_response())
}

pub(super) async fn handle_webhook(
    State(engine): State<AppState>,
    Path(gateway): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let callback = inbound(query, &headers, body);
    match engine.ingress.webhook(&gateway, &callback).await? {
        WebhookOutcome::Applied(order) => Ok(Json(serde_json::json!({
            "acknowledged": true,
            "order": order.id,
            "payment_status": order.payment_status,
        }))
        .into_response()),
        WebhookOutcome::UnknownOrder(_) => {
            Ok(Json(serde_json::json!({ "acknowledged": true })).into_response())
        }
    }
}

pub(super) async fn handle_get_order(
    State(engine): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: OrderId = id
        .parse()
        .map_err(|_| CheckoutError::OrderNotFound(id.clone()))?;
    let order = engine.order(&id).await?;
    Ok(Json(order).into_response())
}

pub(super) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// `Authorization: Bearer <token>`, if present. Any other scheme is refused.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, CheckoutError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| CheckoutError::Unauthorized)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(CheckoutError::Unauthorized),
    }
}

fn inbound(query: HashMap<String, String>, headers: &HeaderMap, body: Bytes) -> InboundCallback {
    let mut callback = InboundCallback::new(body.to_vec());
    callback.query = query;
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            callback = callback.with_header(name.as_str(), value);
        }
    }
    callback
}
