//! Error types for the payment-intent lifecycle manager
//!
//! Two layers of errors exist:
//!
//! - [`GatewayError`] is what a gateway client reports. Its
//!   [`GatewayErrorCategory`] is a closed enum, so adding a category forces
//!   every match (most importantly the classifier) to handle it.
//! - [`PaymentError`] is what callers of the orchestrator and reconciler see.
//!   Each variant carries a suggested HTTP status and a retryable flag.
//!
//! # Error Categories
//!
//! - **Local errors**: validation failures, duplicate in-flight requests,
//!   missing records. These never involve the gateway.
//! - **Gateway errors**: declined instruments, rejected parameters, remote
//!   outages, connectivity failures, bad credentials, anything unrecognized.

use serde::Serialize;
use thiserror::Error;

/// Error category reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayErrorCategory {
    /// The card or other instrument was declined
    CardDeclined,
    /// The gateway rejected the request parameters
    InvalidRequest,
    /// The gateway failed internally
    Api,
    /// The gateway is throttling requests
    RateLimited,
    /// The gateway could not be reached at all
    Connection,
    /// Credentials or account configuration were rejected
    Authentication,
    /// A category this crate does not know, with the gateway's type string
    Unrecognized(String),
}

impl GatewayErrorCategory {
    /// Parse the gateway's `error.type` field
    pub fn from_type(error_type: &str) -> Self {
        match error_type {
            "card_error" => Self::CardDeclined,
            "invalid_request_error" | "idempotency_error" => Self::InvalidRequest,
            "api_error" => Self::Api,
            "rate_limit_error" => Self::RateLimited,
            "api_connection_error" => Self::Connection,
            "authentication_error" | "permission_error" => Self::Authentication,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CardDeclined => "card_error",
            Self::InvalidRequest => "invalid_request_error",
            Self::Api => "api_error",
            Self::RateLimited => "rate_limit_error",
            Self::Connection => "api_connection_error",
            Self::Authentication => "authentication_error",
            Self::Unrecognized(other) => other,
        }
    }
}

/// Error reported by a gateway client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("gateway {}: {message}", category.as_str())]
pub struct GatewayError {
    pub category: GatewayErrorCategory,
    /// Raw message from the gateway (or the transport)
    pub message: String,
    /// Gateway error code, e.g. `amount_too_small`
    pub code: Option<String>,
    /// Offending request parameter
    pub param: Option<String>,
    /// Decline reason for card errors
    pub decline_code: Option<String>,
}

impl GatewayError {
    pub fn new(category: GatewayErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            code: None,
            param: None,
            decline_code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_decline_code(mut self, decline_code: impl Into<String>) -> Self {
        self.decline_code = Some(decline_code.into());
        self
    }

    /// Create a connectivity error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCategory::Connection, message)
    }

    /// Create a declined-instrument error
    pub fn declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCategory::CardDeclined, message)
    }

    /// Create a resource-missing error as the gateway reports it
    pub fn not_found(id: &str) -> Self {
        Self::new(
            GatewayErrorCategory::InvalidRequest,
            format!("No such payment_intent: '{}'", id),
        )
        .with_code("resource_missing")
        .with_param("intent")
    }
}

/// Diagnostic detail attached to gateway-derived errors
///
/// Only serialized to callers outside production mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub param: Option<String>,
    pub decline_code: Option<String>,
    pub raw_message: Option<String>,
}

impl From<&GatewayError> for ErrorDetails {
    fn from(error: &GatewayError) -> Self {
        Self {
            code: error.code.clone(),
            error_type: Some(error.category.as_str().to_string()),
            param: error.param.clone(),
            decline_code: error.decline_code.clone(),
            raw_message: Some(error.message.clone()),
        }
    }
}

/// Main error type for the payment-intent lifecycle manager
///
/// Each variant maps to a suggested caller-facing status code via
/// [`PaymentError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Bad input, rejected before touching the gate or the gateway
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the problem, safe to show to callers
        message: String,
    },

    /// Another creation attempt for the same order is in progress
    ///
    /// Callers should back off briefly and retry; the original request's
    /// response stays authoritative.
    #[error("Payment for order {order_id} is already being processed")]
    Conflict {
        /// Order whose creation attempt is in flight
        order_id: String,
    },

    /// The payment instrument was declined
    #[error("{message}")]
    InstrumentDeclined {
        /// Decline message passed through from the gateway
        message: String,
        details: ErrorDetails,
    },

    /// The gateway rejected the request parameters
    #[error("The payment request was rejected by the payment provider")]
    InvalidRequest { details: ErrorDetails },

    /// The gateway failed internally
    #[error("The payment provider is temporarily unavailable")]
    GatewayUnavailable { details: ErrorDetails },

    /// The gateway could not be reached
    #[error("The payment provider could not be reached")]
    GatewayUnreachable { details: ErrorDetails },

    /// The gateway rejected our credentials or configuration
    #[error("Payment processing is not configured correctly")]
    GatewayMisconfigured { details: ErrorDetails },

    /// No payment record matches the lookup key
    #[error("No payment record found for {key}")]
    NotFound {
        /// Human-readable lookup key, e.g. `payment intent pi_1`
        key: String,
    },

    /// Anything that could not be classified
    #[error("An unexpected error occurred while processing the payment")]
    Unknown { details: ErrorDetails },
}

impl PaymentError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation {
            message: message.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(order_id: &str) -> Self {
        PaymentError::Conflict {
            order_id: order_id.to_string(),
        }
    }

    /// Create a NotFound error for a remote transaction id
    pub fn intent_not_found(remote_transaction_id: &str) -> Self {
        PaymentError::NotFound {
            key: format!("payment intent {}", remote_transaction_id),
        }
    }

    /// Create a NotFound error for an order id
    pub fn order_not_found(order_id: &str) -> Self {
        PaymentError::NotFound {
            key: format!("order {}", order_id),
        }
    }

    /// Suggested HTTP status for callers
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::Conflict { .. } => 409,
            PaymentError::InstrumentDeclined { .. } => 400,
            PaymentError::InvalidRequest { .. } => 400,
            PaymentError::GatewayUnavailable { .. } => 503,
            PaymentError::GatewayUnreachable { .. } => 503,
            PaymentError::GatewayMisconfigured { .. } => 500,
            PaymentError::NotFound { .. } => 404,
            PaymentError::Unknown { .. } => 500,
        }
    }

    /// Whether the same request may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Conflict { .. }
                | PaymentError::GatewayUnavailable { .. }
                | PaymentError::GatewayUnreachable { .. }
        )
    }

    /// Stable machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::Validation { .. } => "ValidationError",
            PaymentError::Conflict { .. } => "ConflictError",
            PaymentError::InstrumentDeclined { .. } => "InstrumentDeclined",
            PaymentError::InvalidRequest { .. } => "InvalidRequest",
            PaymentError::GatewayUnavailable { .. } => "GatewayUnavailable",
            PaymentError::GatewayUnreachable { .. } => "GatewayUnreachable",
            PaymentError::GatewayMisconfigured { .. } => "GatewayMisconfigured",
            PaymentError::NotFound { .. } => "NotFoundError",
            PaymentError::Unknown { .. } => "Unknown",
        }
    }

    /// Gateway diagnostics, if this error came from the gateway
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            PaymentError::InstrumentDeclined { details, .. }
            | PaymentError::InvalidRequest { details }
            | PaymentError::GatewayUnavailable { details }
            | PaymentError::GatewayUnreachable { details }
            | PaymentError::GatewayMisconfigured { details }
            | PaymentError::Unknown { details } => Some(details),
            _ => None,
        }
    }
}
