//! Inbound stream traits

use async_trait::async_trait;
use serde::Deserialize;

use crate::SourceError;

/// One message read from an ordered log
///
/// `ack` and `nack` consume the message. Dropping a message without calling
/// either leaves it unacknowledged; it is redelivered after a restart.
pub trait SourceMessage: Send + Sync + 'static {
    /// Raw payload bytes
    fn value(&self) -> &[u8];

    /// Partition the message was read from
    fn partition(&self) -> i32;

    /// Offset of the message within its partition
    fn offset(&self) -> i64;

    /// Mark the message as successfully processed
    fn ack(self) -> Result<(), SourceError>;

    /// Mark the message as failed (routed to dead-letter if configured)
    fn nack(self) -> Result<(), SourceError>;
}

/// An ordered log shared by all workers of one subscriber
#[async_trait]
pub trait InboundStream: Send + Sync + 'static {
    /// Message type handed to workers
    type Message: SourceMessage;

    /// Stream name, used in logs
    fn name(&self) -> &str;

    /// Begin reading. Called once before any `next_message`.
    async fn start(&self) -> Result<(), SourceError>;

    /// Stop reading. Pending `next_message` calls return `None`.
    async fn stop(&self);

    /// Next message, or `None` once the stream is stopped or exhausted
    async fn next_message(&self) -> Option<Self::Message>;
}

/// Where a consumer starts when it has no committed offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialOffset {
    /// Start from the beginning of the log
    #[default]
    Oldest,
    /// Skip everything already in the log
    Newest,
}

impl InitialOffset {
    /// Get the initial offset as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oldest => "oldest",
            Self::Newest => "newest",
        }
    }
}
