//! Herald - Sinks
//!
//! Outbound delivery strategies for the dispatch engine.
//!
//! # Available Sinks
//!
//! | Sink | Settlement | Dispatch table |
//! |------|------------|----------------|
//! | `webhook` | when the callback answers | No |
//! | `bulk` | when the batch result for the item arrives | Yes (`BulkAdapter`) |
//!
//! Both strategies read change-events with an `ItemBuilder`
//! (`NotificationBuilder` / `NotificationIndexBuilder`) that decodes the
//! payload, applies the subscriber's domain filter and derives the
//! identity key.
//!
//! # Example
//!
//! ```ignore
//! use herald_sinks::webhook::{NotificationBuilder, WebhookDelivery};
//!
//! let builder = NotificationBuilder::new(KeyStrategy::Location);
//! let delivery = WebhookDelivery::new("app", &webhook_config, Arc::clone(&metrics))?;
//! let engine = Engine::new("app", stream, Arc::new(builder), Arc::new(delivery), metrics);
//! engine.start().await?;
//! ```

mod error;
mod event;

/// Batched bulk indexing
pub mod bulk;

/// Direct webhook callbacks
pub mod webhook;

pub use error::SinkError;
