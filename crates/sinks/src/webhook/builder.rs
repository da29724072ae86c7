//! Change-event to notification builder

use std::sync::Arc;

use herald_config::FilterConfig;
use herald_dispatch::{BuildOutcome, DecodeError, DispatchMetrics, ItemBuilder};
use herald_protocol::{KeyStrategy, MessageType, Notification};
use herald_sources::SourceMessage;

use crate::event::{decode_selected, notification_for};

/// Builds webhook notifications from change-events
///
/// Delete events are acknowledged without a callback: the record's
/// retention has passed and there is nothing to notify.
pub struct NotificationBuilder {
    key_strategy: KeyStrategy,
    filter: FilterConfig,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl NotificationBuilder {
    /// Create a builder
    pub fn new(key_strategy: KeyStrategy) -> Self {
        Self {
            key_strategy,
            filter: FilterConfig::default(),
            metrics: None,
        }
    }

    /// Only notify for selected domains
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

impl<M: SourceMessage> ItemBuilder<M> for NotificationBuilder {
    type Request = Notification;

    fn build(&self, message: &M) -> Result<BuildOutcome<Notification>, DecodeError> {
        let Some(event) = decode_selected(message, &self.filter)? else {
            return Ok(BuildOutcome::Skip {
                reason: "domain not selected",
            });
        };

        if event.message_type == MessageType::Delete {
            return Ok(BuildOutcome::Skip {
                reason: "retention passed",
            });
        }

        let key = self
            .key_strategy
            .derive(message.partition(), message.offset(), &event);
        let request = notification_for(message, &event, self.metrics.as_deref());
        Ok(BuildOutcome::Deliver { key, request })
    }
}
