//! Dispatch error types

use herald_protocol::ProtocolError;
use herald_sources::SourceError;
use thiserror::Error;

/// Dispatch engine errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The inbound stream refused to start
    #[error("failed to start stream '{stream}': {source}")]
    StreamStart {
        /// Stream name
        stream: String,
        /// Underlying source error
        #[source]
        source: SourceError,
    },

    /// The batched sink no longer accepts requests
    #[error("sink '{0}' is closed")]
    SinkClosed(String),

    /// Acknowledging a source message failed
    #[error("failed to acknowledge message: {0}")]
    Ack(#[from] SourceError),
}

impl DispatchError {
    /// Create a StreamStart error
    pub fn stream_start(stream: impl Into<String>, source: SourceError) -> Self {
        Self::StreamStart {
            stream: stream.into(),
            source,
        }
    }
}

/// A payload could not be turned into an outbound request
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a valid change-event
    #[error("malformed payload: {0}")]
    Protocol(#[from] ProtocolError),

    /// Payload decoded but cannot be delivered
    #[error("invalid event: {0}")]
    Invalid(String),
}

impl DecodeError {
    /// Create an Invalid error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
