//! Worker pool
//!
//! A fixed number of symmetric tasks pulling from one shared inbound stream.
//! Workers keep no per-worker state; all coordination goes through the
//! delivery strategy, so the worker count is only a concurrency limit.
//!
//! Each iteration:
//! 1. wait for the next message (or cancellation)
//! 2. build the outbound request
//! 3. nack corrupted payloads, ack skipped ones, hand the rest to delivery
//!
//! Cancellation is checked between messages only. A message that was
//! received is always processed to the point of handing it off.

use std::sync::Arc;

use async_trait::async_trait;
use herald_protocol::IdentityKey;
use herald_sources::{InboundStream, SourceMessage};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::metrics::DispatchMetrics;

/// Default number of workers per engine
pub const DEFAULT_CONCURRENCY: usize = 10;

/// What to do with one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome<R> {
    /// Deliver `request` under `key`
    Deliver { key: IdentityKey, request: R },
    /// Acknowledge without delivering
    Skip { reason: &'static str },
}

/// Turns a source message into an outbound request
pub trait ItemBuilder<M>: Send + Sync + 'static {
    /// Outbound request type
    type Request: Send + Sync + 'static;

    /// Build the request for one message
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the payload is corrupted. The message is
    /// nacked and never retried.
    fn build(&self, message: &M) -> Result<BuildOutcome<Self::Request>, DecodeError>;
}

/// A decoded message ready for delivery
#[derive(Debug)]
pub struct InboundItem<M, R> {
    /// Deduplication key
    pub key: IdentityKey,
    /// Outbound request, opaque to the engine
    pub request: R,
    /// Owning handle on the source message
    pub source: M,
}

/// Outbound delivery strategy
///
/// `deliver` takes ownership of the source message and is responsible for
/// settling it exactly once, now or later.
#[async_trait]
pub trait Delivery<M, R>: Send + Sync + 'static {
    /// Strategy name, used in logs and metrics
    fn name(&self) -> &str;

    /// Deliver one item
    async fn deliver(&self, item: InboundItem<M, R>);

    /// Stop waiting on retries. Called as soon as `stop` begins, while
    /// workers may still be inside `deliver`.
    fn interrupt(&self) {}

    /// Flush anything buffered. Called after the workers have stopped.
    async fn shutdown(&self) {}

    /// Drop every unsettled message, returning how many were dropped
    fn release_pending(&self) -> usize {
        0
    }
}

/// Handle on a running set of workers
pub struct WorkerPool {
    tasks: JoinSet<()>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers (at least one) on the current runtime
    pub fn spawn<S, B, D>(
        concurrency: usize,
        stream: Arc<S>,
        builder: Arc<B>,
        delivery: Arc<D>,
        metrics: Arc<DispatchMetrics>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: InboundStream,
        B: ItemBuilder<S::Message>,
        D: Delivery<S::Message, B::Request>,
    {
        let mut tasks = JoinSet::new();
        for worker_id in 0..concurrency.max(1) {
            let worker = Worker {
                id: worker_id,
                stream: Arc::clone(&stream),
                builder: Arc::clone(&builder),
                delivery: Arc::clone(&delivery),
                metrics: Arc::clone(&metrics),
                cancel: cancel.clone(),
            };
            tasks.spawn(worker.run());
        }
        Self { tasks }
    }

    /// Number of workers not yet finished
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if every worker has finished
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every worker to finish
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(error = %e, "worker panicked");
            }
        }
    }

    /// Abort every worker still running
    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}

struct Worker<S, B, D> {
    id: usize,
    stream: Arc<S>,
    builder: Arc<B>,
    delivery: Arc<D>,
    metrics: Arc<DispatchMetrics>,
    cancel: CancellationToken,
}

impl<S, B, D> Worker<S, B, D>
where
    S: InboundStream,
    B: ItemBuilder<S::Message>,
    D: Delivery<S::Message, B::Request>,
{
    async fn run(self) {
        debug!(worker = self.id, stream = %self.stream.name(), "worker started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = self.stream.next_message() => match message {
                    Some(m) => m,
                    None => break,
                },
            };
            self.process(message).await;
        }

        debug!(worker = self.id, stream = %self.stream.name(), "worker stopped");
    }

    async fn process(&self, message: S::Message) {
        let partition = message.partition();
        let offset = message.offset();

        match self.builder.build(&message) {
            Ok(BuildOutcome::Deliver { key, request }) => {
                self.metrics.record_submitted();
                self.delivery
                    .deliver(InboundItem {
                        key,
                        request,
                        source: message,
                    })
                    .await;
            }
            Ok(BuildOutcome::Skip { reason }) => {
                debug!(partition, offset, reason, "message skipped");
                self.metrics.record_skipped();
                if let Err(e) = message.ack() {
                    warn!(partition, offset, error = %e, "failed to ack skipped message");
                }
            }
            Err(e) => {
                warn!(partition, offset, error = %e, "corrupted message");
                self.metrics.record_corrupted();
                if let Err(e) = message.nack() {
                    warn!(partition, offset, error = %e, "failed to nack corrupted message");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
