//! Lifecycle controller
//!
//! Owns one subscriber's inbound stream, worker pool and delivery strategy,
//! and moves them through `Initialized -> Started -> Stopped`.
//!
//! # Design
//!
//! - State lives in an `AtomicU8` and only changes by compare-and-swap
//! - `start` and `stop` are serialized by an async mutex and are idempotent
//! - A stream that fails to start leaves the engine `Stopped`, never half-started
//! - `stop` interrupts the delivery strategy first, then waits up to
//!   `shutdown_timeout`; workers still running after it are aborted and the
//!   outcome is reported as `TimedOut`
//! - Entries still pending after shutdown are dropped unacknowledged and
//!   counted as abandoned, so they are redelivered by the log

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use herald_sources::InboundStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, Result};
use crate::metrics::{DispatchMetrics, EngineMetricsHandle};
use crate::worker::{DEFAULT_CONCURRENCY, Delivery, ItemBuilder, WorkerPool};

/// Default bound on how long `stop` waits for workers
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Initialized = 0,
    Started = 1,
    Stopped = 2,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initialized,
            1 => Self::Started,
            _ => Self::Stopped,
        }
    }

    /// Get the state as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call to `stop` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every worker finished within the timeout
    Completed,
    /// Workers were aborted after the timeout
    TimedOut,
    /// The engine was already stopped
    AlreadyStopped,
}

/// Dispatch engine for one subscriber
pub struct Engine<S, B, D> {
    subscriber: String,
    stream: Arc<S>,
    builder: Arc<B>,
    delivery: Arc<D>,
    metrics: Arc<DispatchMetrics>,
    concurrency: usize,
    shutdown_timeout: Duration,
    state: AtomicU8,
    cancel: CancellationToken,
    workers: Mutex<Option<WorkerPool>>,
}

impl<S, B, D> Engine<S, B, D>
where
    S: InboundStream,
    B: ItemBuilder<S::Message>,
    D: Delivery<S::Message, B::Request>,
{
    /// Create an engine in the `Initialized` state
    ///
    /// `metrics` should be the same instance the delivery strategy records into.
    pub fn new(
        subscriber: impl Into<String>,
        stream: Arc<S>,
        builder: Arc<B>,
        delivery: Arc<D>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            subscriber: subscriber.into(),
            stream,
            builder,
            delivery,
            metrics,
            concurrency: DEFAULT_CONCURRENCY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            state: AtomicU8::new(EngineState::Initialized as u8),
            cancel: CancellationToken::new(),
            workers: Mutex::new(None),
        }
    }

    /// Set the worker count (0 means the default)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        self
    }

    /// Set how long `stop` waits for workers
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Subscriber name
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// Worker count
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Metrics handle for the reporter; stays valid after `stop`
    pub fn metrics_handle(&self) -> EngineMetricsHandle {
        EngineMetricsHandle::new(
            self.subscriber.clone(),
            self.delivery.name(),
            Arc::clone(&self.metrics),
        )
    }

    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Start the stream and the workers
    ///
    /// Calling `start` on a started or stopped engine does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::StreamStart` if the inbound stream fails to
    /// start. The engine is then `Stopped`.
    pub async fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;

        match self.state() {
            EngineState::Initialized => {}
            EngineState::Started => return Ok(()),
            EngineState::Stopped => {
                debug!(subscriber = %self.subscriber, "start ignored, engine stopped");
                return Ok(());
            }
        }

        info!(
            subscriber = %self.subscriber,
            stream = %self.stream.name(),
            delivery = %self.delivery.name(),
            concurrency = self.concurrency,
            "starting"
        );

        if let Err(e) = self.stream.start().await {
            self.transition(EngineState::Initialized, EngineState::Stopped);
            error!(subscriber = %self.subscriber, error = %e, "start failed");
            return Err(DispatchError::stream_start(self.stream.name(), e));
        }

        *workers = Some(WorkerPool::spawn(
            self.concurrency,
            Arc::clone(&self.stream),
            Arc::clone(&self.builder),
            Arc::clone(&self.delivery),
            Arc::clone(&self.metrics),
            self.cancel.clone(),
        ));
        self.transition(EngineState::Initialized, EngineState::Started);

        info!(subscriber = %self.subscriber, "started");
        Ok(())
    }

    /// Stop the workers, the stream and the delivery strategy
    ///
    /// Never fails: a timeout is reported through `StopOutcome::TimedOut`.
    pub async fn stop(&self) -> StopOutcome {
        let mut workers = self.workers.lock().await;

        if self.transition(EngineState::Initialized, EngineState::Stopped) {
            info!(subscriber = %self.subscriber, "stopped before start");
            return StopOutcome::Completed;
        }
        if !self.transition(EngineState::Started, EngineState::Stopped) {
            return StopOutcome::AlreadyStopped;
        }

        info!(subscriber = %self.subscriber, "stopping");
        self.cancel.cancel();
        self.delivery.interrupt();
        self.stream.stop().await;

        let mut outcome = StopOutcome::Completed;
        if let Some(mut pool) = workers.take() {
            let joined = tokio::time::timeout(self.shutdown_timeout, pool.join()).await;
            if joined.is_err() {
                warn!(
                    subscriber = %self.subscriber,
                    timeout = ?self.shutdown_timeout,
                    remaining = pool.len(),
                    "stop timed out"
                );
                pool.abort();
                outcome = StopOutcome::TimedOut;
            }
        }

        self.delivery.shutdown().await;

        let abandoned = self.delivery.release_pending();
        if abandoned > 0 {
            self.metrics.record_abandoned(abandoned);
            warn!(
                subscriber = %self.subscriber,
                abandoned,
                "released unsettled messages"
            );
        }

        info!(subscriber = %self.subscriber, "stopped");
        outcome
    }
}

impl<S, B, D> Drop for Engine<S, B, D> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
