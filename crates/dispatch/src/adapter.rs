//! Batch submission adapter
//!
//! Bridges the per-message worker pool and a batched sink whose results
//! arrive later, on its own task, grouped into batches the engine does not
//! control.
//!
//! # Design
//!
//! - `submit` stores the source message in the dispatch table under its
//!   identity key before handing the request to the sink
//! - A key already in flight is a duplicate: its message is acked at once
//!   and the sink is never called
//! - Batch completions resolve each request back to its key, then settle
//!   and remove the entry according to the item's classification
//! - Retryable items stay in the table until a later completion settles them
//!
//! Every table operation is atomic per key, so a completion racing with a
//! duplicate submit settles each message exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use herald_protocol::IdentityKey;
use herald_sources::SourceMessage;
use tracing::{debug, error, warn};

use crate::batch::{
    BatchError, BatchObserver, BatchResponse, BatchResultItem, BatchSink, FailureInspector,
    KeyResolver,
};
use crate::classify::{Classification, classify};
use crate::entry::DispatchEntry;
use crate::metrics::DispatchMetrics;
use crate::table::{DispatchTable, PutOutcome};
use crate::worker::{Delivery, InboundItem};

/// Deduplicating adapter in front of a batched sink
pub struct BulkAdapter<M, R> {
    name: String,
    sink: Arc<dyn BatchSink<R>>,
    resolver: Arc<dyn KeyResolver<R>>,
    inspector: Option<Arc<dyn FailureInspector<M>>>,
    table: DispatchTable<DispatchEntry<M>>,
    metrics: Arc<DispatchMetrics>,
}

impl<M, R> BulkAdapter<M, R>
where
    M: SourceMessage,
    R: Send + Sync + 'static,
{
    /// Create an adapter with a `shard_count`-way dispatch table
    pub fn new(
        name: impl Into<String>,
        sink: Arc<dyn BatchSink<R>>,
        resolver: Arc<dyn KeyResolver<R>>,
        shard_count: usize,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            sink,
            resolver,
            inspector: None,
            table: DispatchTable::new(shard_count),
            metrics,
        }
    }

    /// Decode stored messages of permanently failed items for diagnostics
    pub fn with_inspector(mut self, inspector: Arc<dyn FailureInspector<M>>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Number of in-flight entries
    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Check if a key is in flight
    pub fn is_pending(&self, key: &IdentityKey) -> bool {
        self.table.contains(key)
    }

    /// Register a message and forward its request to the sink
    pub async fn submit(&self, key: IdentityKey, request: R, source: M) {
        let entry = DispatchEntry::new(source);
        let outcome = self
            .table
            .put_if_absent(key.clone(), entry, |key, _existing, rejected| {
                self.metrics.record_duplicate();
                let (partition, offset) = (rejected.message().partition(), rejected.message().offset());
                debug!(key = %key, partition, offset, "duplicate in flight, acking");
                if let Err(e) = rejected.ack(&self.metrics) {
                    warn!(key = %key, error = %e, "failed to ack duplicate");
                }
            });

        if outcome == PutOutcome::Duplicate {
            return;
        }

        if let Err(e) = self.sink.submit(request).await {
            warn!(key = %key, sink = %self.name, error = %e, "sink rejected request");
            if let Some(entry) = self.table.remove(&key) {
                self.settle_nack(&key, entry);
            }
        }
    }

    fn settle_ack(&self, key: &IdentityKey, entry: DispatchEntry<M>) {
        if let Err(e) = entry.ack(&self.metrics) {
            warn!(key = %key, error = %e, "failed to ack message");
        }
    }

    fn settle_nack(&self, key: &IdentityKey, entry: DispatchEntry<M>) {
        if let Err(e) = entry.nack(&self.metrics) {
            warn!(key = %key, error = %e, "failed to nack message");
        }
    }

    /// Nack and remove the entry for a permanently failed item
    fn fail_permanently(&self, key: &IdentityKey, status: u16, detail: Option<&str>) {
        let Some(entry) = self.table.remove(key) else {
            self.metrics.record_unresolved();
            warn!(key = %key, status, "no in-flight entry for failed item");
            return;
        };

        let identity = self
            .inspector
            .as_ref()
            .and_then(|i| i.inspect(entry.message()))
            .unwrap_or_default();
        error!(
            key = %key,
            status,
            error = detail.unwrap_or(""),
            domain_id = %identity.domain_id,
            workflow_id = %identity.workflow_id,
            run_id = %identity.run_id,
            "delivery failed permanently"
        );
        self.settle_nack(key, entry);
    }

    fn complete_item(&self, execution_id: u64, key: &IdentityKey, item: &BatchResultItem) {
        match classify(item.status) {
            Classification::Success => match self.table.remove(key) {
                Some(entry) => self.settle_ack(key, entry),
                None => {
                    self.metrics.record_unresolved();
                    debug!(execution_id, key = %key, "no in-flight entry for completed item");
                }
            },
            Classification::Permanent => {
                self.fail_permanently(key, item.status, item.error.as_deref());
            }
            Classification::Retryable => {
                self.metrics.record_retry();
                debug!(execution_id, key = %key, status = item.status, "item retryable, left pending");
            }
        }
    }

    fn fail_batch(&self, execution_id: u64, requests: &[R], err: &BatchError) {
        let permanent = err.is_permanent();
        warn!(
            execution_id,
            status = err.status,
            retryable = err.retryable,
            requests = requests.len(),
            error = %err.details,
            "batch failed"
        );

        for request in requests {
            self.metrics.record_failure();
            let Some(key) = self.resolver.resolve(request) else {
                self.metrics.record_unresolved();
                warn!(execution_id, "failed request has no identity key");
                continue;
            };
            if permanent {
                self.fail_permanently(&key, err.status, Some(&err.details));
            }
        }
    }
}

impl<M, R> BatchObserver<R> for BulkAdapter<M, R>
where
    M: SourceMessage,
    R: Send + Sync + 'static,
{
    fn on_batch_start(&self, execution_id: u64, requests: &[R]) {
        self.metrics.record_batch_requests(requests.len());
        debug!(execution_id, requests = requests.len(), "batch started");
    }

    fn on_batch_complete(
        &self,
        execution_id: u64,
        requests: &[R],
        result: Result<&BatchResponse, &BatchError>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(err) => return self.fail_batch(execution_id, requests, err),
        };

        if response.items.len() != requests.len() {
            warn!(
                execution_id,
                requests = requests.len(),
                items = response.items.len(),
                "batch response length mismatch"
            );
        }

        for (position, request) in requests.iter().enumerate() {
            let Some(key) = self.resolver.resolve(request) else {
                self.metrics.record_unresolved();
                warn!(execution_id, position, "completed request has no identity key");
                continue;
            };
            let Some(item) = response.items.get(position) else {
                self.metrics.record_unresolved();
                warn!(execution_id, position, key = %key, "no result for request");
                continue;
            };
            self.complete_item(execution_id, &key, item);
        }
    }
}

#[async_trait]
impl<M, R> Delivery<M, R> for BulkAdapter<M, R>
where
    M: SourceMessage,
    R: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, item: InboundItem<M, R>) {
        self.submit(item.key, item.request, item.source).await;
    }

    async fn shutdown(&self) {
        self.sink.close().await;
    }

    fn release_pending(&self) -> usize {
        let released = self.table.drain();
        for (key, entry) in &released {
            debug!(
                key = %key,
                partition = entry.message().partition(),
                offset = entry.message().offset(),
                "releasing unsettled entry"
            );
        }
        released.len()
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod adapter_test;
