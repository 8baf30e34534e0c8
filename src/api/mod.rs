//! HTTP interface
//!
//! An axum router exposing the orchestrator and the reconciler as a small
//! JSON API:
//!
//! ```text
//! POST /api/payments/intents                  create or reuse an intent
//! POST /api/payments/confirm                  reconcile after client confirmation
//! GET  /api/payments/intents/{id}/status      poll by payment intent id
//! GET  /api/payments/orders/{orderId}/status  poll by order id
//! GET  /health                                liveness
//! ```
//!
//! Every error is rendered with the same envelope,
//! `{success: false, message, kind, retryable, details?}`, using the status
//! code suggested by [`PaymentError::status_code`]. Gateway diagnostics
//! (`details`) are left out in production mode.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::core::{
    GatewayClient, IntentOrchestrator, OperatingMode, PaymentStore, Reconciler, ServiceConfig,
};
use crate::types::{ErrorDetails, PaymentError};

pub mod handlers;

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IntentOrchestrator>,
    pub reconciler: Arc<Reconciler>,
    pub mode: OperatingMode,
}

impl AppState {
    /// Wire an orchestrator and a reconciler over the same gateway and store
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        store: Arc<dyn PaymentStore>,
        config: ServiceConfig,
    ) -> Self {
        let mode = config.mode;
        let reconciler = Reconciler::new(Arc::clone(&gateway), Arc::clone(&store));
        let orchestrator = IntentOrchestrator::new(gateway, store, config);
        Self {
            orchestrator: Arc::new(orchestrator),
            reconciler: Arc::new(reconciler),
            mode,
        }
    }

    pub(crate) fn error(&self, error: PaymentError) -> ApiError {
        ApiError {
            error,
            expose_details: self.mode.exposes_details(),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/payments/intents", post(handlers::create_intent))
        .route("/api/payments/confirm", post(handlers::confirm_payment))
        .route(
            "/api/payments/intents/{payment_intent_id}/status",
            get(handlers::intent_status),
        )
        .route(
            "/api/payments/orders/{order_id}/status",
            get(handlers::order_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    message: String,
    kind: &'static str,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<ErrorDetails>,
}

/// A `PaymentError` on its way to the caller
#[derive(Debug)]
pub struct ApiError {
    error: PaymentError,
    expose_details: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let details = if self.expose_details {
            self.error.details().cloned()
        } else {
            None
        };

        let body = ErrorResponse {
            success: false,
            message: self.error.to_string(),
            kind: self.error.kind(),
            retryable: self.error.is_retryable(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
