//! Herald - Metrics
//!
//! Internal metrics collection and reporting for the dispatch engines.
//!
//! # Overview
//!
//! This crate provides:
//! - `Counter`, a relaxed atomic counter used by every engine
//! - `EngineMetricsSnapshot`, the point-in-time view of one engine
//! - `EngineMetricsProvider`, implemented by each engine's metrics handle
//! - `MetricsReporter`, which logs one line per engine at a fixed interval
//!   in human or JSON format
//!
//! # Metrics Handle Pattern
//!
//! Engines keep their counters in an `Arc` and hand out a lightweight handle
//! implementing `EngineMetricsProvider`. The handle stays valid for the life
//! of the process, so the reporter can be built before any engine starts.
//!
//! ```text
//! Engine (owns Arc<DispatchMetrics>)
//!     │
//!     └──► metrics_handle() → Handle (clones Arc, implements EngineMetricsProvider)
//!
//! Herald wiring:
//!     1. Create one engine per subscriber
//!     2. Collect metrics_handle() of each into Vec<Arc<dyn EngineMetricsProvider>>
//!     3. Spawn MetricsReporter::run(cancel)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use herald_metrics::{EngineMetricsProvider, MetricsReporter};
//! use std::sync::Arc;
//!
//! let handle: Arc<dyn EngineMetricsProvider> = Arc::new(engine.metrics_handle());
//! let reporter = MetricsReporter::new(config.metrics.clone(), vec![handle]);
//! tokio::spawn(reporter.run(cancel.clone()));
//! ```

mod counter;
pub mod format;
mod reporter;
mod traits;

pub use counter::Counter;
pub use format::{EngineReport, HumanFormatter, JsonFormatter, MetricsFormatter};
pub use reporter::MetricsReporter;
pub use traits::{EngineMetricsProvider, EngineMetricsSnapshot};
