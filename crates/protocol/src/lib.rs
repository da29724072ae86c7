//! Herald Protocol - Change-event wire format and notification model
//!
//! This crate provides the types that flow from the inbound log into the
//! delivery strategies:
//! - `ChangeEvent` - Decoded workflow lifecycle change-event
//! - `FieldValue` - Tagged attribute value (string, int, bool, binary)
//! - `IdentityKey` - Deterministic key used for in-flight deduplication
//! - `Notification` - Callback payload built from an index event
//!
//! # Wire Format
//!
//! Change-events are JSON documents. Attribute values are adjacently tagged
//! so a payload round-trips without losing the value type:
//!
//! ```text
//! {
//!   "messageType": "index",
//!   "domainId": "d1", "workflowId": "wf", "runId": "r1", "version": 3,
//!   "fields": {
//!     "WorkflowType": { "type": "string", "value": "OrderWorkflow" },
//!     "CustomerTier": { "type": "binary", "value": "ImdvbGQi" }
//!   }
//! }
//! ```

mod error;
mod event;
mod key;
mod notification;

pub use error::ProtocolError;
pub use event::{ChangeEvent, FieldValue, MessageType, decode, encode, well_known};
pub use key::{IdentityKey, KeyStrategy};
pub use notification::{Notification, NotificationType};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
