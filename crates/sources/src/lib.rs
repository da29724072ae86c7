//! Herald - Sources
//!
//! Inbound streams that hand ordered log messages to the dispatch workers.
//!
//! # Contract
//!
//! - `InboundStream` is started once, drained concurrently by many workers
//!   through `next_message()`, and stopped once.
//! - `SourceMessage::ack` / `nack` consume the message, so a message can be
//!   acknowledged at most once by construction.
//! - Every terminal outcome is recorded in an `AckLedger`, which is what the
//!   file log uses to compute its committed watermark.
//!
//! # Available Streams
//!
//! | Stream | Purpose |
//! |--------|---------|
//! | `memory` | In-process ordered log (embedding, tests) |
//! | `file` | Newline-delimited log file with a committed offset and dead-letter file |
//!
//! # Example
//!
//! ```ignore
//! use herald_sources::memory::memory_log;
//!
//! let (producer, stream) = memory_log("events", 1000);
//! producer.publish(0, payload).await?;
//!
//! stream.start().await?;
//! while let Some(msg) = stream.next_message().await {
//!     msg.ack()?;
//! }
//! ```

mod error;
mod ledger;
mod stream;

pub mod file;
pub mod memory;

pub use error::SourceError;
pub use ledger::{AckLedger, AckOutcome};
pub use stream::{InboundStream, InitialOffset, SourceMessage};

pub use file::{FileLog, FileLogConfig, FileMessage};
pub use memory::{MemoryMessage, MemoryProducer, MemoryStream, memory_log};

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Default channel queue size between a stream's reader and its workers
pub const DEFAULT_QUEUE_SIZE: usize = 1000;
