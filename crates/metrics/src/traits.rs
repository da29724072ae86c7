//! Engine metrics snapshot and provider trait
//!
//! Engines expose their counters through `EngineMetricsProvider` so the
//! reporter can collect them without knowing the concrete engine type.

use std::time::Duration;

use serde::Serialize;

/// Point-in-time snapshot of one engine's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetricsSnapshot {
    /// Items handed to the delivery strategy
    pub submitted: u64,
    /// Items whose key was already in flight (acked without delivery)
    pub duplicates: u64,
    /// Source messages acknowledged
    pub acked: u64,
    /// Source messages negatively acknowledged
    pub nacked: u64,
    /// Per-item results left pending for a later retry
    pub retries: u64,
    /// Items covered by a batch-level failure
    pub failures: u64,
    /// Payloads that could not be decoded
    pub corrupted: u64,
    /// Results that could not be correlated with an in-flight entry
    pub unresolved: u64,
    /// Messages acknowledged without delivery (filtered, deletes)
    pub skipped: u64,
    /// Requests seen in started batches
    pub batch_requests: u64,
    /// Entries dropped unacknowledged at shutdown
    pub abandoned: u64,
    /// Number of recorded submit-to-ack latencies
    pub latency_count: u64,
    /// Sum of recorded latencies in microseconds
    pub latency_total_micros: u64,
}

impl EngineMetricsSnapshot {
    /// Average submit-to-ack latency, if anything was recorded
    pub fn avg_latency(&self) -> Option<Duration> {
        (self.latency_count > 0)
            .then(|| Duration::from_micros(self.latency_total_micros / self.latency_count))
    }

    /// Messages with a terminal outcome
    #[inline]
    pub fn settled(&self) -> u64 {
        self.acked + self.nacked
    }

    /// Counter growth since an earlier snapshot
    pub fn delta(&self, previous: &Self) -> Self {
        Self {
            submitted: self.submitted.saturating_sub(previous.submitted),
            duplicates: self.duplicates.saturating_sub(previous.duplicates),
            acked: self.acked.saturating_sub(previous.acked),
            nacked: self.nacked.saturating_sub(previous.nacked),
            retries: self.retries.saturating_sub(previous.retries),
            failures: self.failures.saturating_sub(previous.failures),
            corrupted: self.corrupted.saturating_sub(previous.corrupted),
            unresolved: self.unresolved.saturating_sub(previous.unresolved),
            skipped: self.skipped.saturating_sub(previous.skipped),
            batch_requests: self.batch_requests.saturating_sub(previous.batch_requests),
            abandoned: self.abandoned.saturating_sub(previous.abandoned),
            latency_count: self.latency_count.saturating_sub(previous.latency_count),
            latency_total_micros: self
                .latency_total_micros
                .saturating_sub(previous.latency_total_micros),
        }
    }
}

/// Trait for engines to provide metrics to the reporter
pub trait EngineMetricsProvider: Send + Sync {
    /// Subscriber the engine serves
    fn subscriber(&self) -> &str;

    /// Delivery strategy name ("webhook", "bulk")
    fn delivery(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> EngineMetricsSnapshot;
}
