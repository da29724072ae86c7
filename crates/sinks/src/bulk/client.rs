//! Bulk backend clients

use std::time::Duration;

use async_trait::async_trait;
use herald_dispatch::{BatchError, BatchResponse, BatchResultItem, is_retryable};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::request::BulkRequest;
use crate::error::SinkError;

/// Executes one batch against the bulk backend
///
/// The response must hold one item per request, in request order.
#[async_trait]
pub trait BulkClient: Send + Sync + 'static {
    async fn execute(&self, requests: &[BulkRequest]) -> Result<BatchResponse, BatchError>;
}

/// Elasticsearch-compatible `_bulk` client
pub struct HttpBulkClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBulkClient {
    /// Create a client for the backend at `url`
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Http` if the HTTP client cannot be built.
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/_bulk", url.trim_end_matches('/')),
        })
    }

    /// Bulk endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn body(requests: &[BulkRequest]) -> Result<Vec<u8>, SinkError> {
        let mut body = Vec::with_capacity(requests.len() * 256);
        for request in requests {
            request.write_ndjson(&mut body)?;
        }
        Ok(body)
    }
}

#[async_trait]
impl BulkClient for HttpBulkClient {
    async fn execute(&self, requests: &[BulkRequest]) -> Result<BatchResponse, BatchError> {
        let body = Self::body(requests).map_err(|e| BatchError::new(0, e.to_string(), false))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| BatchError::new(0, e.to_string(), true))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BatchError::new(status, e.to_string(), true))?;

        if !(200..300).contains(&status) {
            let err = SinkError::unexpected_status(status, text);
            return Err(BatchError::new(status, err.to_string(), is_retryable(status)));
        }

        parse_response(&text, requests.len())
            .map_err(|e| BatchError::new(status, e.to_string(), true))
    }
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawItem {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Parse a `_bulk` response body into positional item results
pub(crate) fn parse_response(text: &str, expected: usize) -> Result<BatchResponse, SinkError> {
    let raw: RawResponse = serde_json::from_str(text)?;
    if raw.items.len() != expected {
        return Err(SinkError::invalid_response(format!(
            "expected {expected} items, got {}",
            raw.items.len()
        )));
    }

    let mut items = Vec::with_capacity(raw.items.len());
    for item in raw.items {
        // each item is `{"<op>": {...}}`
        let Some(result) = item.into_iter().next().map(|(_, v)| v) else {
            items.push(BatchResultItem::with_error(0, "empty bulk item"));
            continue;
        };
        let result: RawItem = serde_json::from_value(result)?;
        items.push(BatchResultItem {
            status: result.status,
            error: result.error.map(error_detail),
        });
    }
    Ok(BatchResponse::new(items))
}

fn error_detail(error: Value) -> String {
    match &error {
        Value::String(s) => s.clone(),
        Value::Object(o) => {
            let kind = o.get("type").and_then(Value::as_str).unwrap_or("error");
            match o.get("reason").and_then(Value::as_str) {
                Some(reason) => format!("{kind}: {reason}"),
                None => error.to_string(),
            }
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
