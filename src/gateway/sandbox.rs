//! In-process sandbox gateway
//!
//! `SandboxGateway` keeps payment intents in a `DashMap` and follows the
//! remote gateway's state machine closely enough to run the service without
//! network access and to drive the orchestrator and reconciler in tests.
//!
//! # Behaviour
//!
//! - `create` issues ids `pi_1`, `pi_2`, ... in `requires_confirmation`
//! - `confirm` attaches the instrument and moves the intent to `succeeded`,
//!   except for the test instruments below
//! - `capture` moves `requires_capture` to `succeeded` and rejects anything
//!   else
//!
//! | Instrument                       | Outcome of `confirm`         |
//! |----------------------------------|------------------------------|
//! | `pm_card_chargeDeclined`         | card declined error          |
//! | `pm_card_authenticationRequired` | `requires_action`            |
//! | `pm_card_authorizeOnly`          | `requires_capture`           |
//! | anything else                    | `succeeded`                  |
//!
//! # Test hooks
//!
//! Per-operation call counters, queued one-shot failures
//! ([`fail_next`](SandboxGateway::fail_next)), direct status overrides and an
//! optional artificial latency on `create`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::core::traits::GatewayClient;
use crate::types::{
    BillingDetails, CreateIntentParams, GatewayError, GatewayErrorCategory, RemoteIntent,
    RemoteStatus,
};

/// Test instrument that is always declined
pub const DECLINED_INSTRUMENT: &str = "pm_card_chargeDeclined";
/// Test instrument that requires customer authentication
pub const AUTHENTICATION_INSTRUMENT: &str = "pm_card_authenticationRequired";
/// Test instrument that only authorizes, leaving the intent to be captured
pub const AUTHORIZE_ONLY_INSTRUMENT: &str = "pm_card_authorizeOnly";

/// Gateway operations, used to address counters and injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Create,
    Retrieve,
    Capture,
    Confirm,
    BillingDetails,
}

#[derive(Debug, Default)]
struct CallCounts {
    create: AtomicUsize,
    retrieve: AtomicUsize,
    capture: AtomicUsize,
    confirm: AtomicUsize,
    billing_details: AtomicUsize,
}

impl CallCounts {
    fn counter(&self, op: GatewayOp) -> &AtomicUsize {
        match op {
            GatewayOp::Create => &self.create,
            GatewayOp::Retrieve => &self.retrieve,
            GatewayOp::Capture => &self.capture,
            GatewayOp::Confirm => &self.confirm,
            GatewayOp::BillingDetails => &self.billing_details,
        }
    }
}

/// In-memory stand-in for the remote payment gateway
#[derive(Debug, Default)]
pub struct SandboxGateway {
    intents: DashMap<String, RemoteIntent>,
    metadata: DashMap<String, BTreeMap<String, String>>,
    billing: DashMap<String, BillingDetails>,
    failures: DashMap<GatewayOp, VecDeque<GatewayError>>,
    calls: CallCounts,
    next_id: AtomicU64,
    create_delay: Option<Duration>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create` call wait before answering
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Number of times an operation has been invoked
    pub fn calls(&self, op: GatewayOp) -> usize {
        self.calls.counter(op).load(Ordering::SeqCst)
    }

    /// Queue an error for the next invocation of `op`
    ///
    /// Errors queue up; each invocation consumes at most one.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.failures.entry(op).or_default().push_back(error);
    }

    /// Force an intent into a status, as if the customer or gateway moved it
    pub fn set_status(&self, id: &str, status: RemoteStatus) -> bool {
        match self.intents.get_mut(id) {
            Some(mut intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }

    /// Register billing details for an instrument
    pub fn set_billing_details(&self, payment_method_ref: &str, details: BillingDetails) {
        self.billing.insert(payment_method_ref.to_string(), details);
    }

    /// Snapshot of an intent
    pub fn intent(&self, id: &str) -> Option<RemoteIntent> {
        self.intents.get(id).map(|intent| intent.value().clone())
    }

    /// Metadata attached to an intent at creation
    pub fn metadata(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.metadata.get(id).map(|entry| entry.value().clone())
    }

    /// Number of intents ever created
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    fn enter(&self, op: GatewayOp) -> Result<(), GatewayError> {
        self.calls.counter(op).fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .get_mut(&op)
            .and_then(|mut queue| queue.pop_front());
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GatewayClient for SandboxGateway {
    async fn create(&self, params: CreateIntentParams) -> Result<RemoteIntent, GatewayError> {
        self.enter(GatewayOp::Create)?;

        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        if params.amount <= 0 {
            return Err(GatewayError::new(
                GatewayErrorCategory::InvalidRequest,
                "This value must be greater than or equal to 1.",
            )
            .with_code("parameter_invalid_integer")
            .with_param("amount"));
        }

        let id = format!("pi_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let intent = RemoteIntent {
            id: id.clone(),
            status: RemoteStatus::RequiresConfirmation,
            amount: params.amount,
            currency: params.currency,
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            payment_method_ref: None,
        };

        debug!(
            payment_intent_id = %id,
            amount = intent.amount,
            currency = %intent.currency,
            "sandbox intent created"
        );

        self.metadata.insert(id.clone(), params.metadata);
        self.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve(&self, id: &str) -> Result<RemoteIntent, GatewayError> {
        self.enter(GatewayOp::Retrieve)?;
        self.intent(id).ok_or_else(|| GatewayError::not_found(id))
    }

    async fn capture(&self, id: &str) -> Result<RemoteIntent, GatewayError> {
        self.enter(GatewayOp::Capture)?;
        let mut intent = self
            .intents
            .get_mut(id)
            .ok_or_else(|| GatewayError::not_found(id))?;

        if intent.status != RemoteStatus::RequiresCapture {
            return Err(GatewayError::new(
                GatewayErrorCategory::InvalidRequest,
                format!(
                    "This PaymentIntent could not be captured because it has a status of {}.",
                    intent.status.as_str()
                ),
            )
            .with_code("payment_intent_unexpected_state"));
        }

        intent.status = RemoteStatus::Succeeded;
        Ok(intent.clone())
    }

    async fn confirm(&self, id: &str, instrument: &str) -> Result<RemoteIntent, GatewayError> {
        self.enter(GatewayOp::Confirm)?;
        let mut intent = self
            .intents
            .get_mut(id)
            .ok_or_else(|| GatewayError::not_found(id))?;

        if matches!(
            intent.status,
            RemoteStatus::Succeeded | RemoteStatus::Canceled
        ) {
            return Err(GatewayError::new(
                GatewayErrorCategory::InvalidRequest,
                format!(
                    "This PaymentIntent's status is {} and cannot be confirmed.",
                    intent.status.as_str()
                ),
            )
            .with_code("payment_intent_unexpected_state"));
        }

        intent.payment_method_ref = Some(instrument.to_string());
        if instrument == DECLINED_INSTRUMENT {
            intent.status = RemoteStatus::RequiresPaymentMethod;
            return Err(GatewayError::declined("Your card was declined.")
                .with_code("card_declined")
                .with_decline_code("generic_decline"));
        }

        intent.status = match instrument {
            AUTHENTICATION_INSTRUMENT => RemoteStatus::RequiresAction,
            AUTHORIZE_ONLY_INSTRUMENT => RemoteStatus::RequiresCapture,
            _ => RemoteStatus::Succeeded,
        };

        debug!(payment_intent_id = %id, status = intent.status.as_str(), "sandbox intent confirmed");
        Ok(intent.clone())
    }

    async fn billing_details(
        &self,
        payment_method_ref: &str,
    ) -> Result<BillingDetails, GatewayError> {
        self.enter(GatewayOp::BillingDetails)?;
        Ok(self
            .billing
            .get(payment_method_ref)
            .map(|details| details.value().clone())
            .unwrap_or_default())
    }
}
