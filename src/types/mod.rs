//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `payment`: Local payment records, statuses and request types
//! - `money`: Currencies and minor-unit amounts
//! - `gateway`: Types exchanged with the remote payment gateway
//! - `error`: Error types for the lifecycle manager

pub mod error;
pub mod gateway;
pub mod money;
pub mod payment;

pub use error::{ErrorDetails, GatewayError, GatewayErrorCategory, PaymentError};
pub use gateway::{Address, BillingDetails, CreateIntentParams, RemoteIntent, RemoteStatus};
pub use money::{Currency, Money};
pub use payment::{
    AmountInput, CreateIntentRequest, IntentHandle, PaymentRecord, PaymentStatus, PaymentView,
    RecordUpdate, ValidatedIntentRequest,
};
