//! Bulk index requests

use std::fmt;
use std::sync::Arc;

use herald_dispatch::KeyResolver;
use herald_protocol::{ChangeEvent, IdentityKey};
use serde_json::{Value, json};

/// Bulk operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    Index,
    Delete,
}

impl BulkOp {
    /// Action name on the bulk wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document operation for the bulk backend
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub op: BulkOp,
    pub index: String,
    pub doc_id: String,
    /// External version; the backend keeps the highest version it has seen
    pub version: i64,
    /// Document body (index only)
    pub document: Option<Value>,
    /// Identity key of the source message
    pub key: IdentityKey,
}

impl BulkRequest {
    /// Index `document` for the event's workflow run
    pub fn index(index: impl Into<String>, event: &ChangeEvent, document: Value, key: IdentityKey) -> Self {
        Self {
            op: BulkOp::Index,
            index: index.into(),
            doc_id: doc_id(event),
            version: event.version,
            document: Some(document),
            key,
        }
    }

    /// Delete the document of the event's workflow run
    pub fn delete(index: impl Into<String>, event: &ChangeEvent, key: IdentityKey) -> Self {
        Self {
            op: BulkOp::Delete,
            index: index.into(),
            doc_id: doc_id(event),
            version: event.version,
            document: None,
            key,
        }
    }

    /// Append the NDJSON lines for this request to `body`
    pub fn write_ndjson(&self, body: &mut Vec<u8>) -> Result<(), serde_json::Error> {
        let action = json!({
            self.op.as_str(): {
                "_index": self.index,
                "_id": self.doc_id,
                "version": self.version,
                "version_type": "external",
            }
        });
        serde_json::to_writer(&mut *body, &action)?;
        body.push(b'\n');

        if let Some(document) = &self.document {
            serde_json::to_writer(&mut *body, document)?;
            body.push(b'\n');
        }
        Ok(())
    }
}

/// Document id of a workflow run
pub fn doc_id(event: &ChangeEvent) -> String {
    format!("{}~{}", event.workflow_id, event.run_id)
}

/// Key resolver reading the key carried by each request
pub fn key_resolver() -> Arc<dyn KeyResolver<BulkRequest>> {
    Arc::new(|request: &BulkRequest| Some(request.key.clone()))
}
