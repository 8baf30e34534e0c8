//! Types exchanged with the remote payment gateway
//!
//! These mirror the gateway's view of a payment intent. They are kept separate
//! from the local [`PaymentRecord`](super::PaymentRecord) because the two
//! status machines are independent: the local status is derived from the
//! remote one by the reconciler, never copied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::payment::PaymentStatus;

/// Remote intent status as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    /// Funds are authorized and held, awaiting capture
    RequiresCapture,
    Canceled,
    Succeeded,
    /// Any status this crate does not know about
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::RequiresPaymentMethod => "requires_payment_method",
            RemoteStatus::RequiresConfirmation => "requires_confirmation",
            RemoteStatus::RequiresAction => "requires_action",
            RemoteStatus::Processing => "processing",
            RemoteStatus::RequiresCapture => "requires_capture",
            RemoteStatus::Canceled => "canceled",
            RemoteStatus::Succeeded => "succeeded",
            RemoteStatus::Unknown => "unknown",
        }
    }

    /// Local status implied by an explicit confirmation
    ///
    /// `None` means the remote status says nothing definite and the local
    /// status must be left as it is.
    pub fn confirmed_local_status(&self) -> Option<PaymentStatus> {
        match self {
            RemoteStatus::Succeeded => Some(PaymentStatus::Completed),
            RemoteStatus::Canceled => Some(PaymentStatus::Failed),
            RemoteStatus::RequiresAction => Some(PaymentStatus::Pending),
            _ => None,
        }
    }

    /// Local status implied by a read-only poll
    ///
    /// Only the two terminal transitions are applied when polling.
    pub fn polled_local_status(&self) -> Option<PaymentStatus> {
        match self {
            RemoteStatus::Succeeded => Some(PaymentStatus::Completed),
            RemoteStatus::Canceled => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// A payment intent as seen by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIntent {
    pub id: String,
    pub status: RemoteStatus,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Reference to the payment instrument attached to the intent
    #[serde(default, rename = "payment_method")]
    pub payment_method_ref: Option<String>,
}

/// Parameters for creating a remote intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntentParams {
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    /// Correlation metadata attached to the remote intent
    pub metadata: BTreeMap<String, String>,
    pub receipt_email: Option<String>,
}

/// Postal address captured with the payment instrument
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Billing snapshot of the payment instrument used for an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}
