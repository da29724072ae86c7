//! Change-event decoding shared by the item builders

use herald_config::FilterConfig;
use herald_dispatch::{DecodeError, DispatchMetrics};
use herald_protocol::{ChangeEvent, IdentityKey, Notification};
use herald_sources::SourceMessage;
use tracing::warn;

/// Decode a message, returning `None` when its domain is filtered out
pub(crate) fn decode_selected<M: SourceMessage>(
    message: &M,
    filter: &FilterConfig,
) -> Result<Option<ChangeEvent>, DecodeError> {
    let event = herald_protocol::decode(message.value())?;
    if filter.allows(&event.domain_id) {
        Ok(Some(event))
    } else {
        Ok(None)
    }
}

/// Build the notification for an index event
///
/// The notification id is the log position of the message. Custom
/// attributes that are not valid JSON are logged and counted as corrupted.
pub(crate) fn notification_for<M: SourceMessage>(
    message: &M,
    event: &ChangeEvent,
    metrics: Option<&DispatchMetrics>,
) -> Notification {
    let id = IdentityKey::from_location(message.partition(), message.offset());
    let (notification, corrupted) = Notification::from_event(id.as_str(), event);

    if !corrupted.is_empty() {
        warn!(
            id = %id,
            domain_id = %event.domain_id,
            workflow_id = %event.workflow_id,
            run_id = %event.run_id,
            attributes = ?corrupted,
            "corrupted search attributes"
        );
        if let Some(metrics) = metrics {
            for _ in &corrupted {
                metrics.record_corrupted();
            }
        }
    }
    notification
}
