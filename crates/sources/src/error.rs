//! Source error types

use std::io;

use thiserror::Error;

/// Errors from inbound streams and message acknowledgment
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to open or read the underlying log
    #[error("failed to read log '{path}': {source}")]
    Io {
        /// Path of the log or offset file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to write a nacked payload to the dead-letter file
    #[error("failed to write dead-letter record to '{path}': {source}")]
    DeadLetter {
        /// Path of the dead-letter file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Offset file holds something other than an offset
    #[error("invalid committed offset in '{path}': {value:?}")]
    InvalidOffset {
        /// Path of the offset file
        path: String,
        /// File contents
        value: String,
    },

    /// Stream was already stopped
    #[error("stream '{0}' is closed")]
    Closed(String),
}

impl SourceError {
    /// Create an IO error for a path
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a dead-letter write error
    pub fn dead_letter(path: impl Into<String>, source: io::Error) -> Self {
        Self::DeadLetter {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = SourceError::io(
            "data/events.jsonl",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("data/events.jsonl"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_invalid_offset_display() {
        let err = SourceError::InvalidOffset {
            path: "events.offset".into(),
            value: "abc".into(),
        };
        assert!(err.to_string().contains("\"abc\""));
    }

    #[test]
    fn test_closed_display() {
        assert!(SourceError::Closed("events".into()).to_string().contains("events"));
    }
}
