//! Webhook sink
//!
//! Direct delivery: each index change-event becomes one JSON notification
//! posted to the subscriber's callback URL. The source message is settled
//! as soon as the callback answers.

mod builder;
mod delivery;

pub use builder::NotificationBuilder;
pub use delivery::WebhookDelivery;
