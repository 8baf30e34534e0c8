//! Thread-safe in-memory payment record store
//!
//! This module provides the `InMemoryPaymentStore` struct, which implements
//! [`PaymentStore`] using concurrent data structures to enable safe
//! multi-task access.
//!
//! # Design
//!
//! Two `DashMap`s hold the state:
//!
//! ```text
//! InMemoryPaymentStore
//!     ├── records:  remote transaction id → PaymentRecord   (append-only)
//!     └── by_order: order id → remote transaction id        (current record)
//! ```
//!
//! Records are never removed. Superseded records stay retrievable by remote
//! id, so every order keeps its full history.
//!
//! # Conditional insert
//!
//! `insert` holds the order's `by_order` entry while it checks the current
//! record, which makes the check-and-swap atomic per order. A superseded
//! `pending` record is moved to `failed` under the same entry, so an order
//! never has more than one non-failed record. This is the durable uniqueness
//! guard behind the in-flight gate.
//!
//! # Lock ordering
//!
//! `insert` takes a `by_order` shard lock and then a `records` shard lock.
//! No code path takes them in the opposite order, and no guard is held across
//! an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::traits::PaymentStore;
use crate::types::{PaymentError, PaymentRecord, PaymentStatus, RecordUpdate};

/// Thread-safe payment record store backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    /// All records ever written, by remote transaction id
    records: DashMap<String, PaymentRecord>,

    /// Current record of each order
    by_order: DashMap<String, String>,
}

impl InMemoryPaymentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_order: DashMap::new(),
        }
    }

    /// Total number of records, including superseded ones
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record ever written for an order, current and superseded
    pub fn records_for_order(&self, order_id: &str) -> Vec<PaymentRecord> {
        self.records
            .iter()
            .filter(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Make way for a new current record
    ///
    /// A failed record is always replaceable. A pending record is replaceable
    /// only when the writer names it in `supersedes`, and it is failed in the
    /// same step. Completed and refunded records are never replaced.
    fn retire(&self, current: &str, supersedes: Option<&str>) -> bool {
        let Some(mut entry) = self.records.get_mut(current) else {
            return false;
        };
        let record = entry.value_mut();
        match record.status {
            PaymentStatus::Failed => true,
            PaymentStatus::Pending if supersedes == Some(current) => {
                record.status = record.status.advance(PaymentStatus::Failed);
                record.updated_at = Utc::now();
                debug!(
                    order_id = %record.order_id,
                    payment_intent_id = current,
                    "superseded payment record marked failed"
                );
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_by_order(&self, order_id: &str) -> Result<Option<PaymentRecord>, PaymentError> {
        let remote_id = match self.by_order.get(order_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self
            .records
            .get(&remote_id)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_remote_id(
        &self,
        remote_transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        Ok(self
            .records
            .get(remote_transaction_id)
            .map(|entry| entry.value().clone()))
    }

    async fn insert(
        &self,
        record: PaymentRecord,
        supersedes: Option<&str>,
    ) -> Result<(), PaymentError> {
        if self.records.contains_key(&record.remote_transaction_id) {
            // Remote ids are immutable keys; a second record for the same
            // intent would be a duplicate.
            return Err(PaymentError::conflict(&record.order_id));
        }

        match self.by_order.entry(record.order_id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(record.remote_transaction_id.clone());
            }
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().clone();
                if !self.retire(&current, supersedes) {
                    return Err(PaymentError::conflict(&record.order_id));
                }
                occupied.insert(record.remote_transaction_id.clone());
            }
        }

        self.records
            .insert(record.remote_transaction_id.clone(), record);
        Ok(())
    }

    async fn update(
        &self,
        remote_transaction_id: &str,
        update: RecordUpdate,
    ) -> Result<PaymentRecord, PaymentError> {
        match self.records.get_mut(remote_transaction_id) {
            Some(mut entry) => {
                let record = entry.value_mut();
                if let Some(status) = update.status {
                    record.status = record.status.advance(status);
                }
                if let Some(billing) = update.billing_details {
                    record.billing_details = Some(billing);
                }
                record.updated_at = Utc::now();
                Ok(record.clone())
            }
            None => Err(PaymentError::intent_not_found(remote_transaction_id)),
        }
    }
}
