//! Direct webhook delivery

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_config::WebhookConfig;
use herald_dispatch::{Delivery, DispatchEntry, DispatchMetrics, InboundItem};
use herald_protocol::Notification;
use herald_sources::SourceMessage;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SinkError;

/// Posts each notification to a callback URL
///
/// One request per message, no dispatch table and no batching. The source
/// message is acked on a 2xx answer and nacked once the configured
/// attempts are used up. A delivery waiting between retries when the engine
/// stops leaves its message unsettled, so the log redelivers it.
pub struct WebhookDelivery {
    name: String,
    client: reqwest::Client,
    url: Url,
    max_retries: u32,
    retry_interval: Duration,
    metrics: Arc<DispatchMetrics>,
    interrupted: CancellationToken,
}

impl WebhookDelivery {
    /// Create a delivery posting to `config.url`
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Config` if the URL does not parse, or
    /// `SinkError::Http` if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        config: &WebhookConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Result<Self, SinkError> {
        let url = Url::parse(&config.url)
            .map_err(|e| SinkError::config(format!("invalid webhook url '{}': {e}", config.url)))?;
        let client = reqwest::Client::builder()
            .timeout(config.callback_request_timeout)
            .build()?;

        Ok(Self {
            name: name.into(),
            client,
            url,
            max_retries: config.max_retries,
            retry_interval: config.retry_interval,
            metrics,
            interrupted: CancellationToken::new(),
        })
    }

    /// Callback URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Post one notification body
    async fn post(&self, body: Vec<u8>) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::unexpected_status(status.as_u16(), body))
    }

    /// Post with the configured retries, returning the last error
    async fn post_with_retry(&self, notification: &Notification) -> Result<(), SinkError> {
        let body = notification.to_json();
        let mut attempt = 0;
        loop {
            match self.post(body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    self.metrics.record_retry();
                    debug!(
                        delivery = %self.name,
                        id = %notification.id,
                        attempt,
                        error = %e,
                        "retrying callback"
                    );
                    tokio::select! {
                        _ = self.interrupted.cancelled() => return Err(SinkError::Interrupted),
                        _ = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<M: SourceMessage> Delivery<M, Notification> for WebhookDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, item: InboundItem<M, Notification>) {
        let entry = DispatchEntry::new(item.source);
        let notification = item.request;

        let settled = match self.post_with_retry(&notification).await {
            Ok(()) => entry.ack(&self.metrics),
            Err(SinkError::Interrupted) => {
                self.metrics.record_abandoned(1);
                info!(delivery = %self.name, id = %notification.id, "retry interrupted, message left unsettled");
                drop(entry.into_message());
                return;
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!(
                    delivery = %self.name,
                    id = %notification.id,
                    domain_id = %notification.domain_id,
                    workflow_id = %notification.workflow_id,
                    run_id = %notification.run_id,
                    status = status_of(&e).map(|s| s.as_u16()),
                    error = %e,
                    "callback failed"
                );
                entry.nack(&self.metrics)
            }
        };

        if let Err(e) = settled {
            warn!(delivery = %self.name, key = %item.key, error = %e, "failed to settle message");
        }
    }

    fn interrupt(&self) {
        self.interrupted.cancel();
    }
}

fn status_of(err: &SinkError) -> Option<StatusCode> {
    match err {
        SinkError::UnexpectedStatus { status, .. } => StatusCode::from_u16(*status).ok(),
        SinkError::Http(e) => e.status(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "delivery_test.rs"]
mod delivery_test;
