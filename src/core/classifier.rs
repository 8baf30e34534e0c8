//! Gateway error classification
//!
//! Maps a [`GatewayError`] onto the caller-facing [`PaymentError`] taxonomy.
//!
//! | Gateway category  | Local kind             | Status | Retryable |
//! |-------------------|------------------------|--------|-----------|
//! | card declined     | `InstrumentDeclined`   | 400    | no        |
//! | invalid request   | `InvalidRequest`       | 400    | no        |
//! | api error         | `GatewayUnavailable`   | 503    | yes       |
//! | rate limited      | `GatewayUnavailable`   | 503    | yes       |
//! | connection        | `GatewayUnreachable`   | 503    | yes       |
//! | authentication    | `GatewayMisconfigured` | 500    | no        |
//! | unrecognized      | `Unknown`              | 500    | no        |
//!
//! Only decline messages reach the caller verbatim. Every other variant has a
//! generic message, with the raw gateway diagnostics kept in
//! [`ErrorDetails`] for the HTTP layer to expose or hide.

use tracing::error;

use crate::types::{ErrorDetails, GatewayError, GatewayErrorCategory, PaymentError};

/// Message used when a decline carries no text of its own
pub const DEFAULT_DECLINE_MESSAGE: &str = "Your card was declined.";

/// Classify a gateway error
pub fn classify(err: &GatewayError) -> PaymentError {
    let details = ErrorDetails::from(err);

    match &err.category {
        GatewayErrorCategory::CardDeclined => {
            let message = if err.message.trim().is_empty() {
                DEFAULT_DECLINE_MESSAGE.to_string()
            } else {
                err.message.clone()
            };
            PaymentError::InstrumentDeclined { message, details }
        }
        GatewayErrorCategory::InvalidRequest => PaymentError::InvalidRequest { details },
        GatewayErrorCategory::Api | GatewayErrorCategory::RateLimited => {
            PaymentError::GatewayUnavailable { details }
        }
        GatewayErrorCategory::Connection => PaymentError::GatewayUnreachable { details },
        GatewayErrorCategory::Authentication => {
            error!(
                error_type = err.category.as_str(),
                message = %err.message,
                "payment gateway rejected credentials, check GATEWAY_SECRET_KEY"
            );
            PaymentError::GatewayMisconfigured { details }
        }
        GatewayErrorCategory::Unrecognized(error_type) => {
            error!(
                error_type = %error_type,
                code = ?err.code,
                param = ?err.param,
                message = %err.message,
                "unrecognized payment gateway error"
            );
            PaymentError::Unknown { details }
        }
    }
}
