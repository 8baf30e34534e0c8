//! Request handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::core::Reconciliation;
use crate::types::{
    CreateIntentRequest, Currency, PaymentError, PaymentStatus, PaymentView, RemoteIntent,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub success: bool,
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDetails {
    pub id: String,
    /// Major units
    pub amount: Decimal,
    pub currency: String,
    pub status: &'static str,
}

impl From<&RemoteIntent> for RemoteDetails {
    fn from(remote: &RemoteIntent) -> Self {
        let amount = Currency::new(&remote.currency)
            .map(|currency| Decimal::new(remote.amount, currency.minor_unit_exponent()))
            .unwrap_or_else(|_| Decimal::from(remote.amount));
        Self {
            id: remote.id.clone(),
            amount,
            currency: remote.currency.clone(),
            status: remote.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub success: bool,
    pub status: PaymentStatus,
    pub payment_id: String,
    pub remote_status: Option<&'static str>,
    pub remote_details: Option<RemoteDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub payment: PaymentView,
    /// Absent when the gateway could not be consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<&'static str>,
}

impl From<Reconciliation> for StatusResponse {
    fn from(result: Reconciliation) -> Self {
        Self {
            success: true,
            payment: result.record.view(),
            remote_status: result.remote.map(|remote| remote.status.as_str()),
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_intent(
    State(state): State<AppState>,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<Json<CreateIntentResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| state.error(rejected(rejection)))?;

    let handle = state
        .orchestrator
        .create_or_get_intent(request)
        .await
        .map_err(|e| state.error(e))?;

    let message = handle
        .reused
        .then(|| "Existing payment intent returned".to_string());

    Ok(Json(CreateIntentResponse {
        success: true,
        client_secret: handle.client_secret,
        payment_intent_id: handle.remote_transaction_id,
        reused: handle.reused,
        message,
    }))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| state.error(rejected(rejection)))?;

    let payment_intent_id = request
        .payment_intent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| state.error(PaymentError::validation("Payment intent ID is required")))?;

    let result = state
        .reconciler
        .confirm(payment_intent_id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(ConfirmResponse {
        success: true,
        status: result.record.status,
        payment_id: result.record.id.clone(),
        remote_status: result.remote.as_ref().map(|remote| remote.status.as_str()),
        remote_details: result.remote.as_ref().map(RemoteDetails::from),
    }))
}

pub async fn intent_status(
    State(state): State<AppState>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let result = state
        .reconciler
        .poll(&payment_intent_id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(result.into()))
}

pub async fn order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let result = state
        .reconciler
        .poll_order(&order_id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(result.into()))
}

fn rejected(rejection: JsonRejection) -> PaymentError {
    PaymentError::validation(format!("Invalid request body: {}", rejection.body_text()))
}
