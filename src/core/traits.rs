//! Core traits for the payment record store and the gateway client
//!
//! These are the two seams of the lifecycle manager. Both are object safe and
//! used as `Arc<dyn ...>` so the implementation can be selected at startup
//! (HTTP gateway or sandbox) and replaced by in-memory fakes in tests.

use async_trait::async_trait;

use crate::types::{
    BillingDetails, CreateIntentParams, GatewayError, PaymentError, PaymentRecord, RecordUpdate,
    RemoteIntent,
};

/// Durable storage of payment records
///
/// Records are keyed by remote transaction id and indexed by order id. The
/// order index points at the order's *current* record; superseded records
/// stay retrievable by their remote id.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Get the current record for an order
    async fn find_by_order(&self, order_id: &str) -> Result<Option<PaymentRecord>, PaymentError>;

    /// Get a record by its remote transaction id
    async fn find_by_remote_id(
        &self,
        remote_transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, PaymentError>;

    /// Insert a new record and make it the order's current record
    ///
    /// This is a conditional write. It succeeds only if the order has no
    /// current record, if the current record is `failed`, or if the current
    /// record is a `pending` record named by `supersedes`. A superseded
    /// record is moved to `failed` in the same write, so an order never has
    /// two non-failed records. Otherwise it fails with
    /// `PaymentError::Conflict`.
    async fn insert(
        &self,
        record: PaymentRecord,
        supersedes: Option<&str>,
    ) -> Result<(), PaymentError>;

    /// Apply an update to the record with the given remote transaction id
    ///
    /// Status changes go through `PaymentStatus::advance` and never move the
    /// record backwards. Returns the record as stored after the update.
    async fn update(
        &self,
        remote_transaction_id: &str,
        update: RecordUpdate,
    ) -> Result<PaymentRecord, PaymentError>;
}

/// Narrow client for the remote payment gateway
///
/// All knowledge of the gateway's request/response shapes lives behind this
/// trait. Implementations own any retrying of transient network failures;
/// callers never retry on their own.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Create a payment intent with automatic capture
    async fn create(&self, params: CreateIntentParams) -> Result<RemoteIntent, GatewayError>;

    /// Fetch the current state of an intent
    async fn retrieve(&self, id: &str) -> Result<RemoteIntent, GatewayError>;

    /// Capture an intent whose funds are authorized
    async fn capture(&self, id: &str) -> Result<RemoteIntent, GatewayError>;

    /// Confirm an intent with the given payment instrument
    async fn confirm(&self, id: &str, instrument: &str) -> Result<RemoteIntent, GatewayError>;

    /// Fetch the billing details of a payment instrument
    async fn billing_details(&self, payment_method_ref: &str)
        -> Result<BillingDetails, GatewayError>;
}
