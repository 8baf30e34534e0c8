//! Order Payments Library
//! # Overview
//!
//! This library manages the lifecycle of payment intents for orders: it
//! decides whether to create a new remote payment intent or reuse the one an
//! order already has, drives the intent through the gateway's status machine,
//! and keeps a local payment record consistent with the remote truth.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (PaymentRecord, Money, RemoteIntent, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::gate`] - Per-order in-flight request gate
//!   - [`core::orchestrator`] - Create-or-reuse of remote intents
//!   - [`core::reconciler`] - Confirmation and status polling
//!   - [`core::classifier`] - Gateway error classification
//!   - [`core::payment_store`] - Payment record storage
//! - [`gateway`] - HTTP and sandbox gateway clients
//! - [`api`] - axum HTTP interface
//!
//! # Payment Statuses
//!
//! Each record moves forward only:
//!
//! - **pending**: Intent created, outcome not yet known
//! - **completed**: The gateway reported the payment succeeded
//! - **failed**: The gateway reported the intent canceled
//! - **refunded**: A completed payment was refunded
//!
//! # Guarantees
//!
//! - At most one creation attempt per order is in flight in a process
//! - At most one current, non-failed record exists per order
//! - A retried request for an order with a live intent gets that intent back
//! - Reconciliation never moves a record backwards

// Module declarations
pub mod api;
pub mod cli;
pub mod core;
pub mod gateway;
pub mod types;

pub use core::{InFlightGate, InMemoryPaymentStore, IntentOrchestrator, Reconciler};
pub use types::{
    CreateIntentRequest, GatewayError, IntentHandle, Money, PaymentError, PaymentRecord,
    PaymentStatus,
};
