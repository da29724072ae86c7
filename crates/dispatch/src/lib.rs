//! Herald Dispatch - Deduplicating batch-acknowledgment engine
//!
//! Consumes an ordered inbound stream with a pool of workers, hands each
//! item to a delivery strategy, and settles every source message exactly
//! once when its outcome is known.
//!
//! # Architecture
//!
//! ```text
//! InboundStream ──► WorkerPool ──► Delivery
//!                   (N tasks)        │
//!                                    ├─ WebhookDelivery (direct, herald-sinks)
//!                                    └─ BulkAdapter ──► BatchSink ──► backend
//!                                         ▲                │
//!                                         └─ BatchObserver ◄┘
//!                                            (on_batch_complete)
//! ```
//!
//! # Design
//!
//! - `DispatchTable` holds one entry per identity key; a second submit of an
//!   in-flight key is acked immediately and never reaches the backend
//! - Completions are correlated positionally with the batch's requests and
//!   resolved back to keys through a sink-supplied `KeyResolver`
//! - `classify` decides per item: success acks, permanent nacks, retryable
//!   leaves the entry pending for a later completion
//! - Nothing here is fatal except a stream that refuses to start
//!
//! # Example
//!
//! ```ignore
//! use herald_dispatch::{BulkAdapter, DispatchMetrics, Engine};
//!
//! let metrics = Arc::new(DispatchMetrics::new());
//! let adapter = Arc::new(BulkAdapter::new("bulk", sink, resolver, 1024, metrics.clone()));
//! let engine = Engine::new("app", stream, builder, adapter, metrics);
//!
//! engine.start().await?;
//! // ...
//! engine.stop().await;
//! ```

mod adapter;
mod batch;
mod classify;
mod engine;
mod entry;
mod error;
mod metrics;
mod table;
mod worker;

pub use adapter::BulkAdapter;
pub use batch::{
    BatchError, BatchObserver, BatchResponse, BatchResultItem, BatchSink, ChangeEventInspector,
    FailureIdentity, FailureInspector, KeyResolver,
};
pub use classify::{Classification, RETRYABLE_STATUS_CODES, classify, is_retryable};
pub use engine::{DEFAULT_SHUTDOWN_TIMEOUT, Engine, EngineState, StopOutcome};
pub use entry::DispatchEntry;
pub use error::{DecodeError, DispatchError, Result};
pub use metrics::{DispatchMetrics, EngineMetricsHandle};
pub use table::{DispatchTable, PutOutcome};
pub use worker::{
    BuildOutcome, DEFAULT_CONCURRENCY, Delivery, InboundItem, ItemBuilder, WorkerPool,
};
