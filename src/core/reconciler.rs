//! Reconciliation of local payment records with the gateway
//!
//! The gateway is the source of truth for a payment's outcome. The
//! `Reconciler` re-reads a remote intent and folds its status into the local
//! record, always through [`PaymentStatus::advance`], so a record never moves
//! backwards however many reconciliations run, in whatever order.
//!
//! # Confirm vs. poll
//!
//! | Step                          | `confirm` | `poll` |
//! |-------------------------------|-----------|--------|
//! | capture authorized funds      | yes       | never  |
//! | `requires_action → pending`   | yes       | no     |
//! | `succeeded → completed`       | yes       | yes    |
//! | `canceled → failed`           | yes       | yes    |
//! | billing details snapshot      | yes       | no     |
//! | gateway unreachable           | error     | stored record returned |
//!
//! Polling may be called far more often than confirmation, so it never
//! causes side effects on the remote system.
//!
//! [`PaymentStatus::advance`]: crate::types::PaymentStatus::advance

use std::sync::Arc;

use tracing::{info, warn};

use super::classifier::classify;
use super::traits::{GatewayClient, PaymentStore};
use crate::types::{
    PaymentError, PaymentRecord, PaymentStatus, RecordUpdate, RemoteIntent, RemoteStatus,
};

/// Result of a reconciliation: the stored record and the remote view it was
/// reconciled against
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub record: PaymentRecord,
    /// `None` when the gateway could not be consulted during a poll
    pub remote: Option<RemoteIntent>,
}

/// Brings local payment records in line with remote intents
pub struct Reconciler {
    gateway: Arc<dyn GatewayClient>,
    store: Arc<dyn PaymentStore>,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn GatewayClient>, store: Arc<dyn PaymentStore>) -> Self {
        Self { gateway, store }
    }

    /// Confirm the outcome of a payment after the client finished it
    ///
    /// Authorized but uncaptured funds are captured first. The capture call's
    /// own response is never trusted; the outcome is always re-read.
    ///
    /// # Returns
    ///
    /// * `Ok(Reconciliation)` - The updated record and the final remote intent
    /// * `Err(PaymentError::NotFound)` - No local record for the intent
    /// * `Err(_)` - The classified gateway error if the intent could not be
    ///   read
    pub async fn confirm(&self, remote_transaction_id: &str) -> Result<Reconciliation, PaymentError> {
        let initial = self.retrieve(remote_transaction_id).await?;

        if initial.status == RemoteStatus::RequiresCapture {
            if let Err(err) = self.gateway.capture(remote_transaction_id).await {
                warn!(
                    payment_intent_id = remote_transaction_id,
                    error = %err,
                    "capture failed, re-reading intent status"
                );
            }
        }

        let remote = self.retrieve(remote_transaction_id).await?;

        let record = self
            .store
            .find_by_remote_id(remote_transaction_id)
            .await?
            .ok_or_else(|| PaymentError::intent_not_found(remote_transaction_id))?;

        let billing_details = match &remote.payment_method_ref {
            Some(payment_method_ref) => {
                match self.gateway.billing_details(payment_method_ref).await {
                    Ok(details) => Some(details),
                    Err(err) => {
                        warn!(
                            payment_intent_id = remote_transaction_id,
                            error = %err,
                            "could not fetch billing details"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let update = RecordUpdate {
            status: remote.status.confirmed_local_status(),
            billing_details,
        };
        let updated = self.store.update(remote_transaction_id, update).await?;

        log_transition(&record, &updated, &remote);

        Ok(Reconciliation {
            record: updated,
            remote: Some(remote),
        })
    }

    /// Refresh a payment's status without side effects on the gateway
    ///
    /// # Returns
    ///
    /// * `Ok(Reconciliation)` - The (possibly updated) record; `remote` is
    ///   `None` if the gateway could not be consulted
    /// * `Err(PaymentError::NotFound)` - No local record for the intent
    pub async fn poll(&self, remote_transaction_id: &str) -> Result<Reconciliation, PaymentError> {
        let record = self
            .store
            .find_by_remote_id(remote_transaction_id)
            .await?
            .ok_or_else(|| PaymentError::intent_not_found(remote_transaction_id))?;

        self.poll_record(record).await
    }

    /// Refresh the status of an order's current payment
    pub async fn poll_order(&self, order_id: &str) -> Result<Reconciliation, PaymentError> {
        let record = self
            .store
            .find_by_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::order_not_found(order_id))?;

        self.poll_record(record).await
    }

    async fn poll_record(&self, record: PaymentRecord) -> Result<Reconciliation, PaymentError> {
        let remote_transaction_id = record.remote_transaction_id.as_str();

        let remote = match self.gateway.retrieve(remote_transaction_id).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(
                    payment_intent_id = remote_transaction_id,
                    error = %err,
                    "gateway unavailable while polling, returning stored status"
                );
                return Ok(Reconciliation {
                    record,
                    remote: None,
                });
            }
        };

        let updated = match remote.status.polled_local_status() {
            Some(status) if record.status.can_transition_to(status) && record.status != status => {
                let update = RecordUpdate {
                    status: Some(status),
                    ..Default::default()
                };
                let updated = self.store.update(remote_transaction_id, update).await?;
                log_transition(&record, &updated, &remote);
                updated
            }
            _ => record,
        };

        Ok(Reconciliation {
            record: updated,
            remote: Some(remote),
        })
    }

    async fn retrieve(&self, remote_transaction_id: &str) -> Result<RemoteIntent, PaymentError> {
        self.gateway
            .retrieve(remote_transaction_id)
            .await
            .map_err(|err| classify(&err))
    }
}

fn log_transition(before: &PaymentRecord, after: &PaymentRecord, remote: &RemoteIntent) {
    if before.status == after.status {
        return;
    }
    info!(
        order_id = %after.order_id,
        payment_intent_id = %after.remote_transaction_id,
        from = before.status.as_str(),
        to = after.status.as_str(),
        remote_status = remote.status.as_str(),
        "payment status changed"
    );
    if after.status == PaymentStatus::Completed {
        info!(order_id = %after.order_id, amount = %after.amount, "payment completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payment_store::InMemoryPaymentStore;
    use crate::gateway::sandbox::{
        GatewayOp, SandboxGateway, AUTHENTICATION_INSTRUMENT, AUTHORIZE_ONLY_INSTRUMENT,
    };
    use crate::types::{
        BillingDetails, CreateIntentParams, Currency, GatewayError, GatewayErrorCategory, Money,
    };
    use rstest::rstest;
    use std::collections::BTreeMap;

    struct Harness {
        gateway: Arc<SandboxGateway>,
        store: Arc<InMemoryPaymentStore>,
        reconciler: Reconciler,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(SandboxGateway::new());
        let store = Arc::new(InMemoryPaymentStore::new());
        let reconciler = Reconciler::new(gateway.clone(), store.clone());
        Harness {
            gateway,
            store,
            reconciler,
        }
    }

    /// Create a remote intent and its pending record, returning the remote id
    async fn seed(h: &Harness, order_id: &str) -> String {
        let intent = h
            .gateway
            .create(CreateIntentParams {
                amount: 100_000,
                currency: "lkr".to_string(),
                metadata: BTreeMap::new(),
                receipt_email: None,
            })
            .await
            .unwrap();
        let record = PaymentRecord::pending(
            order_id,
            Money::from_minor(100_000, Currency::new("lkr").unwrap()),
            &intent.id,
        );
        h.store.insert(record, None).await.unwrap();
        intent.id
    }

    #[tokio::test]
    async fn test_confirm_succeeded_completes_record() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.confirm(&id, "pm_card_visa").await.unwrap();

        let result = h.reconciler.confirm(&id).await.unwrap();

        assert_eq!(result.record.status, PaymentStatus::Completed);
        assert_eq!(result.remote.unwrap().status, RemoteStatus::Succeeded);
        assert_eq!(h.gateway.calls(GatewayOp::Capture), 0);
    }

    #[tokio::test]
    async fn test_confirm_captures_authorized_funds() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway
            .confirm(&id, AUTHORIZE_ONLY_INSTRUMENT)
            .await
            .unwrap();

        let result = h.reconciler.confirm(&id).await.unwrap();

        assert_eq!(h.gateway.calls(GatewayOp::Capture), 1);
        assert_eq!(result.record.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_capture_failure_is_tolerated() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, RemoteStatus::RequiresCapture);
        h.gateway.fail_next(
            GatewayOp::Capture,
            GatewayError::new(GatewayErrorCategory::Api, "capture exploded"),
        );

        let result = h.reconciler.confirm(&id).await.unwrap();

        // Status re-read after the failed capture, record left pending
        assert_eq!(
            result.remote.unwrap().status,
            RemoteStatus::RequiresCapture
        );
        assert_eq!(result.record.status, PaymentStatus::Pending);
        assert_eq!(h.gateway.calls(GatewayOp::Retrieve), 2);
    }

    #[rstest]
    #[case::succeeded(RemoteStatus::Succeeded, PaymentStatus::Completed)]
    #[case::canceled(RemoteStatus::Canceled, PaymentStatus::Failed)]
    #[case::requires_action(RemoteStatus::RequiresAction, PaymentStatus::Pending)]
    #[case::processing(RemoteStatus::Processing, PaymentStatus::Pending)]
    #[case::requires_payment_method(RemoteStatus::RequiresPaymentMethod, PaymentStatus::Pending)]
    #[case::unknown(RemoteStatus::Unknown, PaymentStatus::Pending)]
    #[tokio::test]
    async fn test_confirm_maps_remote_status(
        #[case] remote: RemoteStatus,
        #[case] expected: PaymentStatus,
    ) {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, remote);

        let result = h.reconciler.confirm(&id).await.unwrap();
        assert_eq!(result.record.status, expected);
    }

    #[rstest]
    #[case::processing(RemoteStatus::Processing)]
    #[case::requires_action(RemoteStatus::RequiresAction)]
    #[case::canceled(RemoteStatus::Canceled)]
    #[case::unknown(RemoteStatus::Unknown)]
    #[tokio::test]
    async fn test_completed_record_never_downgraded(#[case] later: RemoteStatus) {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, RemoteStatus::Succeeded);
        h.reconciler.confirm(&id).await.unwrap();

        h.gateway.set_status(&id, later);
        let confirmed = h.reconciler.confirm(&id).await.unwrap();
        let polled = h.reconciler.poll(&id).await.unwrap();

        assert_eq!(confirmed.record.status, PaymentStatus::Completed);
        assert_eq!(polled.record.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_confirm_attaches_billing_details() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        let billing = BillingDetails {
            name: Some("Nimal Perera".to_string()),
            email: Some("nimal@example.com".to_string()),
            ..Default::default()
        };
        h.gateway.set_billing_details("pm_card_visa", billing.clone());
        h.gateway.confirm(&id, "pm_card_visa").await.unwrap();

        let result = h.reconciler.confirm(&id).await.unwrap();
        assert_eq!(result.record.billing_details, Some(billing));
    }

    #[tokio::test]
    async fn test_billing_failure_does_not_fail_confirmation() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.confirm(&id, "pm_card_visa").await.unwrap();
        h.gateway.fail_next(
            GatewayOp::BillingDetails,
            GatewayError::connection("connection reset"),
        );

        let result = h.reconciler.confirm(&id).await.unwrap();

        assert_eq!(result.record.status, PaymentStatus::Completed);
        assert!(result.record.billing_details.is_none());
    }

    #[tokio::test]
    async fn test_confirm_unknown_record_is_not_found() {
        let h = harness();
        let intent = h
            .gateway
            .create(CreateIntentParams {
                amount: 1000,
                currency: "lkr".to_string(),
                metadata: BTreeMap::new(),
                receipt_email: None,
            })
            .await
            .unwrap();

        let err = h.reconciler.confirm(&intent.id).await.unwrap_err();
        assert_eq!(err, PaymentError::intent_not_found(&intent.id));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_confirm_surfaces_classified_gateway_error() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway
            .fail_next(GatewayOp::Retrieve, GatewayError::connection("timed out"));

        let err = h.reconciler.confirm(&id).await.unwrap_err();
        assert_eq!(err.kind(), "GatewayUnreachable");
    }

    #[tokio::test]
    async fn test_poll_never_captures() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, RemoteStatus::RequiresCapture);

        let result = h.reconciler.poll(&id).await.unwrap();

        assert_eq!(h.gateway.calls(GatewayOp::Capture), 0);
        assert_eq!(h.gateway.calls(GatewayOp::BillingDetails), 0);
        assert_eq!(result.record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_poll_applies_terminal_transitions() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.confirm(&id, "pm_card_visa").await.unwrap();

        let result = h.reconciler.poll(&id).await.unwrap();
        assert_eq!(result.record.status, PaymentStatus::Completed);

        let stored = h.store.find_by_remote_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_poll_ignores_requires_action() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway
            .confirm(&id, AUTHENTICATION_INSTRUMENT)
            .await
            .unwrap();

        let result = h.reconciler.poll(&id).await.unwrap();
        assert_eq!(result.record.status, PaymentStatus::Pending);
        assert_eq!(result.remote.unwrap().status, RemoteStatus::RequiresAction);
    }

    #[tokio::test]
    async fn test_poll_returns_stored_record_when_gateway_down() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway
            .fail_next(GatewayOp::Retrieve, GatewayError::connection("refused"));

        let result = h.reconciler.poll(&id).await.unwrap();

        assert!(result.remote.is_none());
        assert_eq!(result.record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_poll_order_uses_current_record() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, RemoteStatus::Canceled);

        let result = h.reconciler.poll_order("ORD-1").await.unwrap();
        assert_eq!(result.record.remote_transaction_id, id);
        assert_eq!(result.record.status, PaymentStatus::Failed);

        let err = h.reconciler.poll_order("ORD-404").await.unwrap_err();
        assert_eq!(err, PaymentError::order_not_found("ORD-404"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconciliations_converge() {
        let h = harness();
        let id = seed(&h, "ORD-1").await;
        h.gateway.set_status(&id, RemoteStatus::Succeeded);

        let attempts = (0..8).map(|i| {
            let reconciler = &h.reconciler;
            let id = id.clone();
            async move {
                if i % 2 == 0 {
                    reconciler.confirm(&id).await
                } else {
                    reconciler.poll(&id).await
                }
            }
        });

        for result in futures::future::join_all(attempts).await {
            assert_eq!(result.unwrap().record.status, PaymentStatus::Completed);
        }
    }
}
