//! Change-event to bulk request builder

use std::sync::Arc;

use herald_config::FilterConfig;
use herald_dispatch::{BuildOutcome, DecodeError, DispatchMetrics, ItemBuilder};
use herald_protocol::{KeyStrategy, MessageType};
use herald_sources::SourceMessage;

use super::request::BulkRequest;
use crate::event::{decode_selected, notification_for};

/// Builds bulk requests from change-events
///
/// `index` events index the notification document of the workflow run,
/// `delete` events delete it.
pub struct NotificationIndexBuilder {
    index: String,
    key_strategy: KeyStrategy,
    filter: FilterConfig,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl NotificationIndexBuilder {
    /// Create a builder writing into `index`
    pub fn new(index: impl Into<String>, key_strategy: KeyStrategy) -> Self {
        Self {
            index: index.into(),
            key_strategy,
            filter: FilterConfig::default(),
            metrics: None,
        }
    }

    /// Only build requests for selected domains
    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Count corrupted attributes into engine metrics
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<M: SourceMessage> ItemBuilder<M> for NotificationIndexBuilder {
    type Request = BulkRequest;

    fn build(&self, message: &M) -> Result<BuildOutcome<BulkRequest>, DecodeError> {
        let Some(event) = decode_selected(message, &self.filter)? else {
            return Ok(BuildOutcome::Skip {
                reason: "domain not selected",
            });
        };

        let key = self
            .key_strategy
            .derive(message.partition(), message.offset(), &event);

        let request = match event.message_type {
            MessageType::Index => {
                let notification = notification_for(message, &event, self.metrics.as_deref());
                let document = serde_json::to_value(&notification)
                    .map_err(|e| DecodeError::invalid(e.to_string()))?;
                BulkRequest::index(&self.index, &event, document, key.clone())
            }
            MessageType::Delete => BulkRequest::delete(&self.index, &event, key.clone()),
        };

        Ok(BuildOutcome::Deliver { key, request })
    }
}
