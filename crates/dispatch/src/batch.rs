//! Batched sink interfaces
//!
//! A batched sink accepts requests one at a time, groups them into batches
//! on its own schedule, and reports each batch back through a
//! `BatchObserver`. Results are positionally correlated with the requests
//! of the batch.

use std::fmt;

use async_trait::async_trait;
use herald_protocol::IdentityKey;
use herald_sources::SourceMessage;

use crate::classify::is_retryable;
use crate::error::DispatchError;

/// Result of one item in an executed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultItem {
    /// HTTP-style status code
    pub status: u16,
    /// Error detail reported by the backend, if any
    pub error: Option<String>,
}

impl BatchResultItem {
    /// Create an item result with no error detail
    pub fn new(status: u16) -> Self {
        Self {
            status,
            error: None,
        }
    }

    /// Create an item result with an error detail
    pub fn with_error(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
        }
    }
}

/// Per-item results of an executed batch, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub items: Vec<BatchResultItem>,
}

impl BatchResponse {
    /// Create a response from item results
    pub fn new(items: Vec<BatchResultItem>) -> Self {
        Self { items }
    }

    /// Check if any item failed
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| !(200..300).contains(&i.status))
    }
}

/// A whole batch failed before per-item results were produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    /// HTTP-style status code (0 for transport errors)
    pub status: u16,
    /// Failure detail
    pub details: String,
    /// Whether the backend may accept the same batch later
    pub retryable: bool,
}

impl BatchError {
    /// Create a batch error
    pub fn new(status: u16, details: impl Into<String>, retryable: bool) -> Self {
        Self {
            status,
            details: details.into(),
            retryable,
        }
    }

    /// Check if the failed items should be nacked rather than left pending
    ///
    /// A failure status outside `RETRYABLE_STATUS_CODES` is permanent even
    /// when flagged retryable. Status 0 (transport) and 2xx (unusable
    /// response body) carry no classification; only the `retryable` flag
    /// decides.
    pub fn is_permanent(&self) -> bool {
        let unclassified = self.status == 0 || (200..300).contains(&self.status);
        !self.retryable || (!unclassified && !is_retryable(self.status))
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch failed with status {} (retryable: {}): {}",
            self.status, self.retryable, self.details
        )
    }
}

impl std::error::Error for BatchError {}

/// Accepts requests for batched delivery
#[async_trait]
pub trait BatchSink<R>: Send + Sync {
    /// Queue one request; may wait for queue space
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::SinkClosed` if the sink no longer accepts requests.
    async fn submit(&self, request: R) -> Result<(), DispatchError>;

    /// Flush queued requests and stop accepting new ones
    async fn close(&self) {}
}

/// Receives batch lifecycle callbacks from a batched sink
///
/// Callbacks run on the sink's task, concurrently with `submit` calls.
pub trait BatchObserver<R>: Send + Sync {
    /// A batch is about to be executed
    fn on_batch_start(&self, execution_id: u64, requests: &[R]);

    /// A batch finished, with either per-item results or a batch-level failure
    fn on_batch_complete(
        &self,
        execution_id: u64,
        requests: &[R],
        result: Result<&BatchResponse, &BatchError>,
    );
}

/// Recovers the identity key carried by a request
pub trait KeyResolver<R>: Send + Sync {
    fn resolve(&self, request: &R) -> Option<IdentityKey>;
}

impl<R, F> KeyResolver<R> for F
where
    F: Fn(&R) -> Option<IdentityKey> + Send + Sync,
{
    fn resolve(&self, request: &R) -> Option<IdentityKey> {
        self(request)
    }
}

/// Business identifiers of a failed item, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureIdentity {
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
}

/// Recovers business identifiers from a stored source message
pub trait FailureInspector<M>: Send + Sync {
    fn inspect(&self, message: &M) -> Option<FailureIdentity>;
}

/// Inspector that decodes the source payload as a change-event
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeEventInspector;

impl<M: SourceMessage> FailureInspector<M> for ChangeEventInspector {
    fn inspect(&self, message: &M) -> Option<FailureIdentity> {
        let event = herald_protocol::decode(message.value()).ok()?;
        Some(FailureIdentity {
            domain_id: event.domain_id,
            workflow_id: event.workflow_id,
            run_id: event.run_id,
        })
    }
}
