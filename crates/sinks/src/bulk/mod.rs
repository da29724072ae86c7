//! Bulk indexing sink
//!
//! Batched delivery into an Elasticsearch-compatible backend. Results come
//! back per item, asynchronously, so this sink is used behind the
//! dispatch engine's `BulkAdapter`.
//!
//! ```text
//! [BulkAdapter] --BulkRequest--> [BulkHandle] --channel--> [BulkProcessor] --_bulk--> [backend]
//!       ▲                                                        │
//!       └──────────────── on_batch_start / on_batch_complete ────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let client = HttpBulkClient::new(&config.url, config.request_timeout)?;
//! let (processor, handle) = BulkProcessor::new("app", BulkSettings::from(&config), client);
//!
//! let adapter = Arc::new(BulkAdapter::new("bulk", Arc::new(handle), key_resolver(), 1024, metrics));
//! tokio::spawn(processor.run(adapter.clone(), cancel));
//! ```

mod builder;
mod client;
mod processor;
mod request;

pub use builder::NotificationIndexBuilder;
pub use client::{BulkClient, HttpBulkClient};
pub use processor::{BulkHandle, BulkProcessor, BulkSettings, DEFAULT_CLOSE_TIMEOUT};
pub use request::{BulkOp, BulkRequest, doc_id, key_resolver};
