//! Protocol error types
//!
//! Errors that can occur when decoding change-event payloads.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not a valid change-event document
    #[error("malformed change-event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload is empty
    #[error("empty payload")]
    EmptyPayload,

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl ProtocolError {
    /// Create a missing field error
    #[inline]
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::missing_field("workflowId");
        assert!(err.to_string().contains("workflowId"));

        let err = ProtocolError::EmptyPayload;
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_malformed_from_json() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"{nope").unwrap_err();
        let err = ProtocolError::from(json_err);
        assert!(err.to_string().starts_with("malformed change-event"));
    }
}
