//! Dispatch engine metrics
//!
//! Counters shared by the worker pool, the delivery strategy and the
//! engine. All operations use relaxed ordering.

use std::sync::Arc;
use std::time::Duration;

use herald_metrics::{Counter, EngineMetricsProvider, EngineMetricsSnapshot};

/// Counters for one engine
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    submitted: Counter,
    duplicates: Counter,
    acked: Counter,
    nacked: Counter,
    retries: Counter,
    failures: Counter,
    corrupted: Counter,
    unresolved: Counter,
    skipped: Counter,
    batch_requests: Counter,
    abandoned: Counter,
    latency_count: Counter,
    latency_total_micros: Counter,
}

impl DispatchMetrics {
    /// Create metrics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an item handed to the delivery strategy
    #[inline]
    pub fn record_submitted(&self) {
        self.submitted.inc();
    }

    /// Record an item whose key was already in flight
    #[inline]
    pub fn record_duplicate(&self) {
        self.duplicates.inc();
    }

    /// Record an ack
    #[inline]
    pub fn record_acked(&self) {
        self.acked.inc();
    }

    /// Record a nack
    #[inline]
    pub fn record_nacked(&self) {
        self.nacked.inc();
    }

    /// Record a retryable item result
    #[inline]
    pub fn record_retry(&self) {
        self.retries.inc();
    }

    /// Record an item covered by a batch-level failure
    #[inline]
    pub fn record_failure(&self) {
        self.failures.inc();
    }

    /// Record an undecodable payload
    #[inline]
    pub fn record_corrupted(&self) {
        self.corrupted.inc();
    }

    /// Record a result that matched no in-flight entry
    #[inline]
    pub fn record_unresolved(&self) {
        self.unresolved.inc();
    }

    /// Record a message acknowledged without delivery
    #[inline]
    pub fn record_skipped(&self) {
        self.skipped.inc();
    }

    /// Record the requests of a started batch
    #[inline]
    pub fn record_batch_requests(&self, count: usize) {
        self.batch_requests.add(count as u64);
    }

    /// Record entries dropped at shutdown
    #[inline]
    pub fn record_abandoned(&self, count: usize) {
        self.abandoned.add(count as u64);
    }

    /// Record a submit-to-ack latency
    #[inline]
    pub fn record_latency(&self, latency: Duration) {
        self.latency_count.inc();
        self.latency_total_micros.add(latency.as_micros() as u64);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            submitted: self.submitted.get(),
            duplicates: self.duplicates.get(),
            acked: self.acked.get(),
            nacked: self.nacked.get(),
            retries: self.retries.get(),
            failures: self.failures.get(),
            corrupted: self.corrupted.get(),
            unresolved: self.unresolved.get(),
            skipped: self.skipped.get(),
            batch_requests: self.batch_requests.get(),
            abandoned: self.abandoned.get(),
            latency_count: self.latency_count.get(),
            latency_total_micros: self.latency_total_micros.get(),
        }
    }
}

/// Handle for reading an engine's metrics from the reporter
///
/// Stays valid after the engine is stopped.
#[derive(Clone)]
pub struct EngineMetricsHandle {
    subscriber: String,
    delivery: String,
    metrics: Arc<DispatchMetrics>,
}

impl EngineMetricsHandle {
    /// Create a handle over shared metrics
    pub fn new(
        subscriber: impl Into<String>,
        delivery: impl Into<String>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            subscriber: subscriber.into(),
            delivery: delivery.into(),
            metrics,
        }
    }
}

impl EngineMetricsProvider for EngineMetricsHandle {
    fn subscriber(&self) -> &str {
        &self.subscriber
    }

    fn delivery(&self) -> &str {
        &self.delivery
    }

    fn snapshot(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }
}
