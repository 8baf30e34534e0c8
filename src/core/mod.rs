//! Core business logic module
//!
//! This module contains the payment-intent lifecycle components:
//! - `traits` - Store and gateway abstractions injected into the components
//! - `gate` - Per-order in-flight request gate
//! - `orchestrator` - Create-or-reuse logic for remote payment intents
//! - `reconciler` - Folds remote intent status into local payment records
//! - `classifier` - Maps gateway errors to caller-facing errors
//! - `payment_store` - Concurrent in-memory payment record store
//! - `config` - Operating mode, charge limits and smoke-test switch

pub mod classifier;
pub mod config;
pub mod gate;
pub mod orchestrator;
pub mod payment_store;
pub mod reconciler;
pub mod traits;

pub use classifier::classify;
pub use config::{ChargeLimits, MinimumOverride, OperatingMode, ServiceConfig};
pub use gate::{GateGuard, InFlightGate};
pub use orchestrator::IntentOrchestrator;
pub use payment_store::InMemoryPaymentStore;
pub use reconciler::{Reconciler, Reconciliation};
pub use traits::{GatewayClient, PaymentStore};
