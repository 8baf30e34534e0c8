//! Intent orchestrator
//!
//! This module provides the `IntentOrchestrator`, which turns a request to pay
//! for an order into exactly one live remote payment intent.
//!
//! # Architecture
//!
//! ```text
//! CreateIntentRequest
//!     │
//!     ▼
//! validate ──────────────► Validation error (no gate, no gateway)
//!     │
//!     ▼
//! InFlightGate::guard ───► Conflict (second concurrent attempt)
//!     │
//!     ▼
//! PaymentStore::find_by_order
//!     │   current record, not failed
//!     ├──► GatewayClient::retrieve ──► still live ──► IntentHandle { reused: true }
//!     │                             └► canceled / fetch failed ──┐
//!     ▼                                                          │
//! GatewayClient::create  ◄───────────────────────────────────────┘
//!     │
//!     ▼
//! PaymentStore::insert (conditional, names the superseded record)
//!     │
//!     ▼
//! IntentHandle { reused: false }
//! ```
//!
//! The gate guard lives on the stack of `create_or_get_intent`, so the order
//! is released on every exit path, including cancellation of the future.
//!
//! # Thread Safety
//!
//! The orchestrator is shared behind an `Arc` by all request handlers. Its
//! gate serializes attempts per order; the store's conditional insert keeps
//! one current record per order even across processes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::classifier::classify;
use super::config::{ServiceConfig, SMOKE_TEST_INSTRUMENT};
use super::gate::InFlightGate;
use super::traits::{GatewayClient, PaymentStore};
use crate::types::{
    CreateIntentParams, CreateIntentRequest, Currency, IntentHandle, PaymentError, PaymentRecord,
    PaymentStatus, RecordUpdate, RemoteIntent, RemoteStatus, ValidatedIntentRequest,
};

/// Creates remote payment intents, or returns the live one an order already has
pub struct IntentOrchestrator {
    gateway: Arc<dyn GatewayClient>,
    store: Arc<dyn PaymentStore>,
    gate: InFlightGate,
    config: ServiceConfig,
}

impl IntentOrchestrator {
    /// Create a new orchestrator with its own in-flight gate
    ///
    /// # Arguments
    ///
    /// * `gateway` - Client for the remote payment gateway
    /// * `store` - Payment record store shared with the reconciler
    /// * `config` - Validated service configuration
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        store: Arc<dyn PaymentStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            gate: InFlightGate::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn gate(&self) -> &InFlightGate {
        &self.gate
    }

    /// Validate a request and convert its amount to minor units
    ///
    /// # Returns
    ///
    /// * `Ok(ValidatedIntentRequest)` - The request is chargeable
    /// * `Err(PaymentError::Validation)` - The order id is missing, the amount
    ///   is missing, non-numeric, not positive or below the currency's
    ///   minimum, or the currency code is malformed
    pub fn validate(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<ValidatedIntentRequest, PaymentError> {
        let order_id = request
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PaymentError::validation("Order ID is required"))?;

        let amount = request
            .amount
            .as_ref()
            .ok_or_else(|| PaymentError::validation("Amount is required"))?
            .to_decimal()?;

        if amount.is_sign_negative() || amount.is_zero() {
            return Err(PaymentError::validation(format!(
                "Amount must be greater than zero, received {}",
                amount
            )));
        }

        let currency = match request.currency.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Currency::new(code)?,
            _ => self.config.default_currency.clone(),
        };

        let amount = self.config.limits.check(amount, currency)?;

        Ok(ValidatedIntentRequest {
            order_id: order_id.to_string(),
            amount,
            customer_email: non_empty(request.customer_email.as_deref()),
            customer_name: non_empty(request.customer_name.as_deref()),
        })
    }

    /// Return the order's live intent, or create one
    ///
    /// # Returns
    ///
    /// * `Ok(IntentHandle)` - With `reused: true` when an existing, still live
    ///   intent was returned
    /// * `Err(PaymentError::Validation)` - The request is not chargeable
    /// * `Err(PaymentError::Conflict)` - Another attempt for the order is in
    ///   flight; retry shortly
    /// * `Err(_)` - The classified gateway error
    pub async fn create_or_get_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<IntentHandle, PaymentError> {
        let validated = self.validate(&request)?;
        let order_id = validated.order_id.as_str();

        let _guard = self
            .gate
            .guard(order_id)
            .ok_or_else(|| PaymentError::conflict(order_id))?;

        let mut supersedes = None;
        if let Some(current) = self.store.find_by_order(order_id).await? {
            if current.status != PaymentStatus::Failed {
                if let Some(handle) = self.reusable_intent(&current).await? {
                    return Ok(handle);
                }
                supersedes = Some(current.remote_transaction_id);
            }
        }

        let intent = self.create_intent(&validated).await?;

        let mut record = PaymentRecord::pending(order_id, validated.amount.clone(), &intent.id);
        record.customer_email = validated.customer_email.clone();
        record.customer_name = validated.customer_name.clone();

        if let Err(err) = self.store.insert(record, supersedes.as_deref()).await {
            warn!(
                order_id,
                payment_intent_id = %intent.id,
                error = %err,
                "remote intent created but not recorded"
            );
            return Err(err);
        }

        info!(
            order_id,
            payment_intent_id = %intent.id,
            amount = %validated.amount,
            superseded = ?supersedes,
            "payment intent created"
        );

        if self.config.smoke_test {
            self.confirm_smoke_test(&intent.id).await?;
        }

        Ok(IntentHandle {
            remote_transaction_id: intent.id,
            client_secret: intent.client_secret,
            reused: false,
        })
    }

    /// Decide whether the order's current intent can be handed out again
    ///
    /// Returns `None` when a new intent must be created. A canceled intent
    /// also marks its record failed. A settled payment whose intent cannot be
    /// fetched is an error, never a reason to charge again.
    async fn reusable_intent(
        &self,
        current: &PaymentRecord,
    ) -> Result<Option<IntentHandle>, PaymentError> {
        let remote_id = current.remote_transaction_id.as_str();

        match self.gateway.retrieve(remote_id).await {
            Ok(remote) if remote.status != RemoteStatus::Canceled => {
                info!(
                    order_id = %current.order_id,
                    payment_intent_id = remote_id,
                    remote_status = remote.status.as_str(),
                    "reusing existing payment intent"
                );
                Ok(Some(IntentHandle {
                    remote_transaction_id: remote.id,
                    client_secret: remote.client_secret,
                    reused: true,
                }))
            }
            Ok(_) => {
                info!(
                    order_id = %current.order_id,
                    payment_intent_id = remote_id,
                    "existing payment intent was canceled, creating a new one"
                );
                let update = RecordUpdate {
                    status: Some(PaymentStatus::Failed),
                    ..Default::default()
                };
                self.store.update(remote_id, update).await?;
                Ok(None)
            }
            Err(err) if current.status.is_terminal() => {
                warn!(
                    order_id = %current.order_id,
                    payment_intent_id = remote_id,
                    error = %err,
                    "could not fetch intent of a settled payment"
                );
                Err(classify(&err))
            }
            Err(err) => {
                warn!(
                    order_id = %current.order_id,
                    payment_intent_id = remote_id,
                    error = %err,
                    "could not fetch existing payment intent, creating a new one"
                );
                Ok(None)
            }
        }
    }

    async fn create_intent(
        &self,
        validated: &ValidatedIntentRequest,
    ) -> Result<RemoteIntent, PaymentError> {
        let mut metadata = BTreeMap::new();
        metadata.insert("order_id".to_string(), validated.order_id.clone());
        if let Some(email) = &validated.customer_email {
            metadata.insert("customer_email".to_string(), email.clone());
        }
        if let Some(name) = &validated.customer_name {
            metadata.insert("customer_name".to_string(), name.clone());
        }
        if self.config.smoke_test {
            metadata.insert("smoke_test".to_string(), "true".to_string());
        }

        let params = CreateIntentParams {
            amount: validated.amount.minor,
            currency: validated.amount.currency.to_string(),
            metadata,
            receipt_email: validated.customer_email.clone(),
        };

        self.gateway.create(params).await.map_err(|err| {
            warn!(order_id = %validated.order_id, error = %err, "payment intent creation failed");
            classify(&err)
        })
    }

    async fn confirm_smoke_test(&self, remote_id: &str) -> Result<(), PaymentError> {
        let confirmed = self
            .gateway
            .confirm(remote_id, SMOKE_TEST_INSTRUMENT)
            .await
            .map_err(|err| classify(&err))?;

        info!(
            payment_intent_id = remote_id,
            remote_status = confirmed.status.as_str(),
            "smoke-test intent confirmed"
        );
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
