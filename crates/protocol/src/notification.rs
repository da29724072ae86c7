//! Notification model
//!
//! A `Notification` is the callback payload delivered to a subscriber for one
//! index change-event. Attributes are split into search attributes (JSON
//! values) and memo (opaque bytes, base64 text).

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{ChangeEvent, FieldValue, well_known};

/// Kind of lifecycle transition a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    /// Workflow run started
    #[serde(rename = "workflowStarted")]
    WorkflowStarted,
    /// Workflow run closed
    #[serde(rename = "workflowClosed")]
    WorkflowClosed,
    /// Running workflow changed its custom search attributes
    #[serde(rename = "upsertSearchAttributes")]
    UpsertSearchAttributes,
}

impl NotificationType {
    /// Classify an index event
    ///
    /// A close time wins; otherwise custom attributes mean an upsert.
    pub fn of(event: &ChangeEvent) -> Self {
        if event.field(well_known::CLOSE_TIME).is_some() {
            Self::WorkflowClosed
        } else if event.has_custom_fields() {
            Self::UpsertSearchAttributes
        } else {
            Self::WorkflowStarted
        }
    }

    /// Get the type as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStarted => "workflowStarted",
            Self::WorkflowClosed => "workflowClosed",
            Self::UpsertSearchAttributes => "upsertSearchAttributes",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback payload for one workflow change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique notification id (log position of the source event)
    pub id: String,
    pub notification_type: NotificationType,
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub search_attributes: Map<String, Value>,
    pub memo: Map<String, Value>,
}

impl Notification {
    /// Build a notification from an index event
    ///
    /// Returns the notification and the names of custom attributes whose
    /// binary value was not valid JSON. Those attributes are kept as `null`
    /// so one bad attribute doesn't block the whole notification.
    pub fn from_event(id: impl Into<String>, event: &ChangeEvent) -> (Self, Vec<String>) {
        let mut search_attributes = Map::new();
        let mut memo = Map::new();
        let mut corrupted = Vec::new();

        for (name, value) in &event.fields {
            match value {
                FieldValue::String(s) => {
                    search_attributes.insert(name.clone(), Value::String(s.clone()));
                }
                FieldValue::Int(v) => {
                    search_attributes.insert(name.clone(), Value::from(*v));
                }
                FieldValue::Bool(b) => {
                    search_attributes.insert(name.clone(), Value::Bool(*b));
                }
                FieldValue::Binary(bytes) if name == well_known::MEMO => {
                    memo.insert(name.clone(), Value::String(STANDARD.encode(bytes)));
                }
                FieldValue::Binary(bytes) => {
                    let decoded = serde_json::from_slice(bytes).unwrap_or_else(|_| {
                        corrupted.push(name.clone());
                        Value::Null
                    });
                    search_attributes.insert(name.clone(), decoded);
                }
            }
        }
        corrupted.sort();

        let workflow_type = event
            .field(well_known::WORKFLOW_TYPE)
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
            .to_string();

        let notification = Self {
            id: id.into(),
            notification_type: NotificationType::of(event),
            domain_id: event.domain_id.clone(),
            workflow_id: event.workflow_id.clone(),
            run_id: event.run_id.clone(),
            workflow_type,
            started_at: timestamp_field(event, well_known::START_TIME),
            closed_at: timestamp_field(event, well_known::CLOSE_TIME),
            search_attributes,
            memo,
        };

        (notification, corrupted)
    }

    /// Serialize to the JSON callback body
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Read an int attribute holding unix nanoseconds
fn timestamp_field(event: &ChangeEvent, name: &str) -> Option<DateTime<Utc>> {
    event
        .field(name)
        .and_then(FieldValue::as_int)
        .filter(|nanos| *nanos > 0)
        .map(DateTime::from_timestamp_nanos)
}
