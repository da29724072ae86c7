//! Bulk processor
//!
//! Groups requests into batches and executes them through a `BulkClient`,
//! reporting every execution to a `BatchObserver`.
//!
//! # Design
//!
//! - Requests arrive over a bounded channel; a full queue blocks `submit`
//! - A batch is flushed when it reaches `bulk_actions` requests or when
//!   `flush_interval` elapses with requests buffered
//! - Items with a retryable status are re-executed with exponential backoff
//!   before the batch is reported; the report always carries one result per
//!   request, so items still retryable stay pending in the observer
//! - A retryable batch-level failure is reported, then the whole batch is
//!   executed again under a new execution id, up to `max_retries` times
//! - Requests still retryable after that go back into the buffer and ride
//!   along with the next flush, until they settle or the processor closes
//! - `BulkHandle::close` flushes what is buffered and waits for the final
//!   report, bounded by the close timeout; requests still retryable at that
//!   point are dropped and left pending in the observer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_config::BulkConfig;
use herald_dispatch::{BatchError, BatchObserver, BatchResponse, BatchSink, DispatchError, is_retryable};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::BulkClient;
use super::request::BulkRequest;

/// Default bound on how long `close` waits for the final flush
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Batching settings
#[derive(Debug, Clone)]
pub struct BulkSettings {
    pub bulk_actions: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub queue_size: usize,
    pub close_timeout: Duration,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self::from(&BulkConfig::default())
    }
}

impl From<&BulkConfig> for BulkSettings {
    fn from(config: &BulkConfig) -> Self {
        Self {
            bulk_actions: config.bulk_actions.max(1),
            flush_interval: config.flush_interval,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            queue_size: config.queue_size.max(1),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl BulkSettings {
    /// Set how long `close` waits for the final flush
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Submission side of a bulk processor
pub struct BulkHandle {
    name: String,
    tx: mpsc::Sender<BulkRequest>,
    closing: CancellationToken,
    finished: CancellationToken,
    close_timeout: Duration,
}

impl BulkHandle {
    /// Check if the processor has exited
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }
}

#[async_trait]
impl BatchSink<BulkRequest> for BulkHandle {
    async fn submit(&self, request: BulkRequest) -> Result<(), DispatchError> {
        if self.closing.is_cancelled() {
            return Err(DispatchError::SinkClosed(self.name.clone()));
        }
        self.tx
            .send(request)
            .await
            .map_err(|_| DispatchError::SinkClosed(self.name.clone()))
    }

    async fn close(&self) {
        self.closing.cancel();
        if tokio::time::timeout(self.close_timeout, self.finished.cancelled())
            .await
            .is_err()
        {
            warn!(
                sink = %self.name,
                timeout = ?self.close_timeout,
                "bulk processor did not finish before close timeout"
            );
        }
    }
}

/// Batching task in front of a bulk client
pub struct BulkProcessor<C> {
    name: String,
    client: C,
    settings: BulkSettings,
    rx: mpsc::Receiver<BulkRequest>,
    buffer: Vec<BulkRequest>,
    next_execution_id: u64,
    closing: CancellationToken,
    finished: CancellationToken,
}

impl<C: BulkClient> BulkProcessor<C> {
    /// Create a processor and its submission handle
    pub fn new(name: impl Into<String>, settings: BulkSettings, client: C) -> (Self, BulkHandle) {
        let name = name.into();
        let (tx, rx) = mpsc::channel(settings.queue_size.max(1));
        let closing = CancellationToken::new();
        let finished = CancellationToken::new();

        let handle = BulkHandle {
            name: name.clone(),
            tx,
            closing: closing.clone(),
            finished: finished.clone(),
            close_timeout: settings.close_timeout,
        };
        let processor = Self {
            name,
            client,
            buffer: Vec::with_capacity(settings.bulk_actions),
            settings,
            rx,
            next_execution_id: 1,
            closing,
            finished,
        };
        (processor, handle)
    }

    /// Run until the handle is closed, every handle is dropped, or `cancel` fires
    ///
    /// Buffered requests are flushed before returning.
    pub async fn run(mut self, observer: Arc<dyn BatchObserver<BulkRequest>>, cancel: CancellationToken) {
        info!(
            sink = %self.name,
            bulk_actions = self.settings.bulk_actions,
            flush_interval = ?self.settings.flush_interval,
            "bulk processor starting"
        );

        let mut flush_interval = tokio::time::interval(self.settings.flush_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = self.closing.cancelled() => break,
                _ = cancel.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => {
                        self.buffer.push(request);
                        if self.buffer.len() >= self.settings.bulk_actions {
                            self.flush_buffer(observer.as_ref()).await;
                        }
                    }
                    None => break,
                },
                _ = flush_interval.tick() => {
                    if !self.buffer.is_empty() {
                        self.flush_buffer(observer.as_ref()).await;
                    }
                }
            }
        }

        // Take whatever was queued before the channel closed
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            self.buffer.push(request);
        }

        // One last pass per batch, nothing is requeued
        let mut pending = std::mem::take(&mut self.buffer);
        let mut dropped = 0;
        while !pending.is_empty() {
            let rest = pending.split_off(pending.len().min(self.settings.bulk_actions));
            dropped += self.flush(pending, observer.as_ref()).await.len();
            pending = rest;
        }
        if dropped > 0 {
            warn!(sink = %self.name, requests = dropped, "retryable requests dropped at close");
        }

        self.finished.cancel();
        info!(
            sink = %self.name,
            executions = self.next_execution_id - 1,
            "bulk processor stopped"
        );
    }

    fn next_execution_id(&mut self) -> u64 {
        let id = self.next_execution_id;
        self.next_execution_id += 1;
        id
    }

    /// Flush the buffer, putting requests that are still retryable back
    async fn flush_buffer(&mut self, observer: &dyn BatchObserver<BulkRequest>) {
        let requests = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.settings.bulk_actions));
        let retry = self.flush(requests, observer).await;
        if !retry.is_empty() {
            debug!(sink = %self.name, requests = retry.len(), "requeued retryable requests");
            self.buffer.extend(retry);
        }
    }

    /// Execute and report one batch, returning the requests that are still retryable
    async fn flush(
        &mut self,
        requests: Vec<BulkRequest>,
        observer: &dyn BatchObserver<BulkRequest>,
    ) -> Vec<BulkRequest> {
        let mut delay = self.settings.initial_backoff;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, self.settings.max_backoff);
            }

            let execution_id = self.next_execution_id();
            observer.on_batch_start(execution_id, &requests);
            debug!(sink = %self.name, execution_id, requests = requests.len(), attempt, "executing batch");

            match self.execute(&requests).await {
                Ok(response) => {
                    observer.on_batch_complete(execution_id, &requests, Ok(&response));
                    return still_retryable(requests, &response);
                }
                Err(err) => {
                    observer.on_batch_complete(execution_id, &requests, Err(&err));
                    if err.is_permanent() {
                        return Vec::new();
                    }
                    warn!(
                        sink = %self.name,
                        execution_id,
                        attempt,
                        max_retries = self.settings.max_retries,
                        error = %err,
                        "batch failed, will retry"
                    );
                }
            }
        }

        warn!(
            sink = %self.name,
            requests = requests.len(),
            "max retries exceeded, requeueing batch"
        );
        requests
    }

    /// Execute a batch, re-executing retryable items until they settle or
    /// retries run out
    async fn execute(&self, requests: &[BulkRequest]) -> Result<BatchResponse, BatchError> {
        let mut response = self.client.execute(requests).await?;
        let mut delay = self.settings.initial_backoff;

        for attempt in 1..=self.settings.max_retries {
            let positions: Vec<usize> = response
                .items
                .iter()
                .enumerate()
                .filter(|(position, item)| *position < requests.len() && is_retryable(item.status))
                .map(|(position, _)| position)
                .collect();
            if positions.is_empty() {
                break;
            }

            debug!(
                sink = %self.name,
                attempt,
                items = positions.len(),
                delay_ms = delay.as_millis(),
                "retrying items"
            );
            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, self.settings.max_backoff);

            let retry: Vec<BulkRequest> = positions.iter().map(|&p| requests[p].clone()).collect();
            match self.client.execute(&retry).await {
                Ok(retried) => {
                    for (&position, item) in positions.iter().zip(retried.items) {
                        response.items[position] = item;
                    }
                }
                Err(err) => {
                    warn!(sink = %self.name, attempt, error = %err, "item retry failed");
                    break;
                }
            }
        }

        Ok(response)
    }
}

/// Requests whose result is retryable or missing
fn still_retryable(requests: Vec<BulkRequest>, response: &BatchResponse) -> Vec<BulkRequest> {
    requests
        .into_iter()
        .enumerate()
        .filter(|(position, _)| {
            response
                .items
                .get(*position)
                .is_none_or(|item| is_retryable(item.status))
        })
        .map(|(_, request)| request)
        .collect()
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
