//! HTTP JSON API over the checkout engine.
//!
//! Endpoints:
//! - GET  /health                          - Liveness and configured gateways
//! - POST /checkout/{gateway}              - Place an order and start its payment
//! - GET  /checkout/{gateway}/capture      - Provider redirect return
//! - POST /checkout/{gateway}/capture      - Redirect return (form) or SDK capture (JSON)
//! - POST /checkout/{gateway}/webhook      - Provider server-to-server notification
//! - GET  /orders/{id}                     - Current order state
//!
//! Error bodies only ever carry a generic message; detail goes to the log.

mod handlers;

use crate::application::engine::CheckoutEngine;
use crate::error::CheckoutError;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use self::handlers::{
    handle_capture, handle_checkout, handle_get_order, handle_health, handle_not_found,
    handle_webhook,
};

/// Provider payloads are small; anything larger is not a genuine callback.
const MAX_BODY_SIZE: usize = 256 * 1024;

pub type AppState = Arc<CheckoutEngine>;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Maps the error taxonomy onto transport status codes.
pub fn status_for(error: &CheckoutError) -> StatusCode {
    match error {
        CheckoutError::InvalidCoupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::InsufficientInventory { .. } => StatusCode::CONFLICT,
        CheckoutError::ReconciliationConflict(_) => StatusCode::CONFLICT,
        CheckoutError::GatewayRejected { .. } | CheckoutError::Transport(_) => {
            StatusCode::BAD_GATEWAY
        }
        CheckoutError::SignatureInvalid(_) | CheckoutError::Unauthorized => StatusCode::UNAUTHORIZED,
        CheckoutError::MalformedPayload(_) | CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::OrderNotFound(_)
        | CheckoutError::UnknownGateway(_)
        | CheckoutError::UnknownResource(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A `CheckoutError` on its way out of a handler.
pub struct ApiError(pub CheckoutError);

impl From<CheckoutError> for ApiError {
    fn from(error: CheckoutError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, %status, "Request failed");
        } else {
            tracing::info!(error = %self.0, %status, "Request rejected");
        }
        json_error(status, self.0.public_message())
    }
}

pub fn router(engine: CheckoutEngine) -> Router {
    let state: AppState = Arc::new(engine);
    Router::new()
        .route("/health", get(handle_health))
        .route("/checkout/{gateway}", post(handle_checkout))
        .route(
            "/checkout/{gateway}/capture",
            get(handle_capture).post(handle_capture),
        )
        .route("/checkout/{gateway}/webhook", post(handle_webhook))
        .route("/orders/{id}", get(handle_get_order))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Serves the API until Ctrl+C.
pub async fn serve(engine: CheckoutEngine, bind: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Checkout API listening");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
