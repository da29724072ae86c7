//! Change-event types
//!
//! A `ChangeEvent` is the decoded form of one payload read from the inbound
//! log: a workflow visibility record (index) or a retention expiry (delete).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// Attribute names with a fixed meaning in the workflow visibility record
pub mod well_known {
    /// Workflow type name (string)
    pub const WORKFLOW_TYPE: &str = "WorkflowType";
    /// Workflow start time in unix nanoseconds (int)
    pub const START_TIME: &str = "StartTime";
    /// Workflow close time in unix nanoseconds (int)
    pub const CLOSE_TIME: &str = "CloseTime";
    /// Workflow close status (int)
    pub const CLOSE_STATUS: &str = "CloseStatus";
    /// Workflow history length (int)
    pub const HISTORY_LENGTH: &str = "HistoryLength";
    /// Workflow memo (binary, opaque)
    pub const MEMO: &str = "Memo";

    /// All system attributes. Anything else is a custom search attribute.
    pub const SYSTEM_FIELDS: &[&str] = &[
        WORKFLOW_TYPE,
        START_TIME,
        CLOSE_TIME,
        CLOSE_STATUS,
        HISTORY_LENGTH,
        MEMO,
    ];

    /// Check if an attribute name is a system attribute
    #[inline]
    pub fn is_system_field(name: &str) -> bool {
        SYSTEM_FIELDS.contains(&name)
    }
}

/// Kind of change carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Visibility record was created or updated
    Index,
    /// Workflow run passed retention and its record should be removed
    Delete,
}

impl MessageType {
    /// Get the message type as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged attribute value
///
/// Binary values are base64 text on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// Opaque bytes
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl FieldValue {
    /// Name of the value's type, as used in the wire tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Binary(_) => "binary",
        }
    }

    /// Get the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value, if this is an int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the raw bytes, if this is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }
}

/// Decoded workflow lifecycle change-event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Kind of change
    pub message_type: MessageType,

    /// Domain the workflow belongs to
    pub domain_id: String,

    /// Workflow identifier
    pub workflow_id: String,

    /// Run identifier
    pub run_id: String,

    /// Monotonic record version (used for external versioning downstream)
    #[serde(default)]
    pub version: i64,

    /// Visibility attributes
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl ChangeEvent {
    /// Create an index event with no attributes
    pub fn index(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::Index,
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            version: 0,
            fields: HashMap::new(),
        }
    }

    /// Create a delete event
    pub fn delete(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::Delete,
            ..Self::index(domain_id, workflow_id, run_id)
        }
    }

    /// Set the record version
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Add an attribute
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Look up an attribute
    #[inline]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Check if any attribute is a custom search attribute
    pub fn has_custom_fields(&self) -> bool {
        self.fields
            .keys()
            .any(|name| !well_known::is_system_field(name))
    }
}

/// Decode a change-event from a raw log payload
///
/// # Errors
///
/// Returns `ProtocolError` if the payload is empty, is not a valid
/// change-event document (including unknown message or field types), or
/// has no workflow id.
pub fn decode(payload: &[u8]) -> Result<ChangeEvent> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    let event: ChangeEvent = serde_json::from_slice(payload)?;
    if event.workflow_id.is_empty() {
        return Err(ProtocolError::missing_field("workflowId"));
    }
    Ok(event)
}

/// Encode a change-event into its wire form
pub fn encode(event: &ChangeEvent) -> Vec<u8> {
    // Serializing plain maps and strings cannot fail
    serde_json::to_vec(event).unwrap_or_default()
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
