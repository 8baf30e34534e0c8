//! In-flight request gate
//!
//! This module provides the `InFlightGate` struct, which enforces at most one
//! concurrent creation attempt per order within this process.
//!
//! # Design
//!
//! The gate is a `DashMap` from order id to the instant the attempt started.
//! Acquisition uses the entry API, so check-and-insert is a single atomic step
//! on the order's shard. Attempts for different orders never block each other.
//!
//! Acquisition never waits: a second attempt for the same order fails
//! immediately and the caller reports a conflict.
//!
//! # Guaranteed release
//!
//! [`InFlightGate::guard`] returns a [`GateGuard`] that releases the order on
//! drop. Dropping happens on every exit path of the creation operation:
//! normal return, `?` propagation, panic, and cancellation of the future that
//! holds the guard.
//!
//! # Scope
//!
//! The gate is process local. Exclusion across instances comes from the
//! payment store's conditional insert.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-order creation gate
#[derive(Debug, Default)]
pub struct InFlightGate {
    /// Orders with a creation attempt in progress, and when it started
    in_flight: DashMap<String, Instant>,
}

impl InFlightGate {
    /// Create a new, empty gate
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Try to mark an order as in flight
    ///
    /// # Returns
    ///
    /// * `true` - The caller now owns the order's creation attempt and must
    ///   call [`release`](Self::release)
    /// * `false` - Another attempt for the order is already in flight
    pub fn try_acquire(&self, order_id: &str) -> bool {
        let mut acquired = false;
        self.in_flight
            .entry(order_id.to_string())
            .or_insert_with(|| {
                acquired = true;
                Instant::now()
            });
        acquired
    }

    /// Release an order; releasing an order that is not held is a no-op
    pub fn release(&self, order_id: &str) {
        self.in_flight.remove(order_id);
    }

    /// Acquire an order and return a guard that releases it on drop
    pub fn guard(&self, order_id: &str) -> Option<GateGuard<'_>> {
        if self.try_acquire(order_id) {
            Some(GateGuard {
                gate: self,
                order_id: order_id.to_string(),
            })
        } else {
            None
        }
    }

    /// Whether an attempt for the order is in flight
    pub fn is_held(&self, order_id: &str) -> bool {
        self.in_flight.contains_key(order_id)
    }

    /// How long the order's current attempt has been running
    pub fn held_for(&self, order_id: &str) -> Option<Duration> {
        self.in_flight
            .get(order_id)
            .map(|started| started.value().elapsed())
    }

    /// Number of orders currently in flight
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Releases its order when dropped
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a InFlightGate,
    order_id: String,
}

impl GateGuard<'_> {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(&self.order_id);
    }
}
