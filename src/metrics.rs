//! Lightweight in-memory counters for the statement observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct ObserverMetrics {
    observed: AtomicU64,
    matched: AtomicU64,
    warnings: AtomicU64,
    errors: AtomicU64,
    chain_unavailable: AtomicU64,
}

static OBSERVER_METRICS: OnceLock<ObserverMetrics> = OnceLock::new();

fn metrics() -> &'static ObserverMetrics {
    OBSERVER_METRICS.get_or_init(ObserverMetrics::default)
}

pub fn record_observed() {
    metrics().observed.fetch_add(1, Ordering::Relaxed);
}

/// One matching statement and the records it produced
pub fn record_match(warnings: u64, errors: u64) {
    let metrics = metrics();
    metrics.matched.fetch_add(1, Ordering::Relaxed);
    metrics.warnings.fetch_add(warnings, Ordering::Relaxed);
    metrics.errors.fetch_add(errors, Ordering::Relaxed);
}

pub fn record_chain_unavailable() {
    metrics().chain_unavailable.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Serialize)]
pub struct ObserverMetricsSnapshot {
    pub observed: u64,
    pub matched: u64,
    pub warnings: u64,
    pub errors: u64,
    pub chain_unavailable: u64,
}

pub fn snapshot() -> ObserverMetricsSnapshot {
    let metrics = metrics();
    ObserverMetricsSnapshot {
        observed: metrics.observed.load(Ordering::Relaxed),
        matched: metrics.matched.load(Ordering::Relaxed),
        warnings: metrics.warnings.load(Ordering::Relaxed),
        errors: metrics.errors.load(Ordering::Relaxed),
        chain_unavailable: metrics.chain_unavailable.load(Ordering::Relaxed),
    }
}
