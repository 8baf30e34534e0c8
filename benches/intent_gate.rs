//! Benchmark suite for the intent creation hot path
//!
//! Uses the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Benchmarks
//!
//! - gate acquire/release for one order and across many orders
//! - `create_or_get_intent` reusing a live intent (the retry fast path)
//! - `create_or_get_intent` creating intents for fresh orders
//!
//! The orchestrator benchmarks run against the sandbox gateway, so they
//! measure local overhead only.

use divan::Bencher;
use order_payments::core::{InFlightGate, InMemoryPaymentStore, IntentOrchestrator, ServiceConfig};
use order_payments::gateway::SandboxGateway;
use order_payments::CreateIntentRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn main() {
    divan::main();
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn orchestrator() -> IntentOrchestrator {
    IntentOrchestrator::new(
        Arc::new(SandboxGateway::new()),
        Arc::new(InMemoryPaymentStore::new()),
        ServiceConfig::default(),
    )
}

/// Acquire and release the same order repeatedly
#[divan::bench]
fn gate_acquire_release_same_order() {
    let gate = InFlightGate::new();
    for _ in 0..1_000 {
        let guard = gate.guard(divan::black_box("ORD-1"));
        divan::black_box(&guard);
    }
}

/// Hold many orders at once, then release them all
#[divan::bench(args = [10, 1_000, 10_000])]
fn gate_many_orders(bencher: Bencher, orders: usize) {
    let ids: Vec<String> = (0..orders).map(|i| format!("ORD-{}", i)).collect();
    bencher.bench_local(|| {
        let gate = InFlightGate::new();
        for id in &ids {
            gate.try_acquire(id);
        }
        for id in &ids {
            gate.release(id);
        }
    });
}

/// Retry of an order whose intent is still live
#[divan::bench]
fn reuse_live_intent(bencher: Bencher) {
    let rt = runtime();
    let orchestrator = orchestrator();
    rt.block_on(orchestrator.create_or_get_intent(CreateIntentRequest::new("ORD-1", 1000)))
        .expect("Seeding failed");

    bencher.bench_local(|| {
        let handle = rt
            .block_on(orchestrator.create_or_get_intent(CreateIntentRequest::new("ORD-1", 1000)))
            .expect("Reuse failed");
        assert!(handle.reused);
    });
}

/// First request for a new order
#[divan::bench]
fn create_for_new_order(bencher: Bencher) {
    let rt = runtime();
    let orchestrator = orchestrator();
    let next = AtomicUsize::new(0);

    bencher.bench_local(|| {
        let order_id = format!("ORD-{}", next.fetch_add(1, Ordering::Relaxed));
        rt.block_on(orchestrator.create_or_get_intent(CreateIntentRequest::new(order_id, 1000)))
            .expect("Creation failed");
    });
}
