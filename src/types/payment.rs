//! Payment record types
//!
//! This module defines the local payment record kept for every order, its
//! status machine, and the request/handle types of the intent orchestrator.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gateway::BillingDetails;
use super::money::Money;
use super::PaymentError;

/// Local view of a payment's outcome
///
/// Transitions only move forward:
///
/// ```text
/// pending ──► completed ──► refunded
///    │
///    └──────► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Whether `next` is a legal successor of this status
    ///
    /// Staying in the same status is always allowed.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        ) || self == next
    }

    /// Apply an observed status, ignoring illegal transitions
    ///
    /// Repeated application is idempotent and the result never moves
    /// backwards, so concurrent reconciliations of the same payment converge.
    pub fn advance(self, next: PaymentStatus) -> PaymentStatus {
        if self.can_transition_to(next) {
            next
        } else {
            self
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Local payment record, one current record per order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Local record identifier
    pub id: String,

    /// External correlation key, also the in-flight gate key
    pub order_id: String,

    /// Amount actually charged, in minor units
    pub amount: Money,

    pub status: PaymentStatus,

    /// Gateway handle; immutable once the record exists
    pub remote_transaction_id: String,

    /// Snapshot of the instrument's billing details, captured at confirmation
    pub billing_details: Option<BillingDetails>,

    pub customer_email: Option<String>,
    pub customer_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create a new pending record for a freshly created remote intent
    pub fn pending(
        order_id: impl Into<String>,
        amount: Money,
        remote_transaction_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            amount,
            status: PaymentStatus::Pending,
            remote_transaction_id: remote_transaction_id.into(),
            billing_details: None,
            customer_email: None,
            customer_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> PaymentView {
        PaymentView {
            id: self.id.clone(),
            order_id: self.order_id.clone(),
            amount: self.amount.to_major(),
            currency: self.amount.currency.to_string(),
            status: self.status,
            created: self.created_at,
        }
    }
}

/// Changes a writer wants applied to a stored record
///
/// The store applies `status` through [`PaymentStatus::advance`], so an update
/// can never move a record backwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub status: Option<PaymentStatus>,
    pub billing_details: Option<BillingDetails>,
}

/// Caller-facing projection of a payment record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created: DateTime<Utc>,
}

/// Amount as sent by clients: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    /// Coerce the input into a decimal
    pub fn to_decimal(&self) -> Result<Decimal, PaymentError> {
        let raw = match self {
            AmountInput::Number(n) => n.to_string(),
            AmountInput::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .map_err(|_| PaymentError::validation(format!("Invalid amount '{}'", raw)))
    }
}

impl From<i64> for AmountInput {
    fn from(value: i64) -> Self {
        AmountInput::Number(value.into())
    }
}

impl From<i32> for AmountInput {
    fn from(value: i32) -> Self {
        AmountInput::Number(value.into())
    }
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        AmountInput::Text(value.to_string())
    }
}

/// Inbound request to pay for an order
///
/// Every field is optional at the type level so that missing fields surface
/// as validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: Option<String>,
    pub amount: Option<AmountInput>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

impl CreateIntentRequest {
    pub fn new(order_id: impl Into<String>, amount: impl Into<AmountInput>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            amount: Some(amount.into()),
            ..Default::default()
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_customer(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self.customer_name = Some(name.into());
        self
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIntentRequest {
    pub order_id: String,
    pub amount: Money,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

/// Result of `create_or_get_intent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentHandle {
    pub remote_transaction_id: String,
    /// Continuation token the client needs to finish authentication
    pub client_secret: Option<String>,
    /// Whether an existing intent was returned instead of creating one
    pub reused: bool,
}
