//! Configuration validation
//!
//! Validates config consistency:
//! - At least one subscriber, with unique non-empty names
//! - Each subscriber has an event log path
//! - The selected delivery method has what it needs
//! - Timeouts and intervals are non-zero

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::subscribers::{BulkConfig, DeliveryMethod, SubscriberConfig, WebhookConfig};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_engine(config)?;
    validate_metrics(config)?;
    validate_subscribers(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> Result<()> {
    require_non_zero(
        "engine",
        "engine",
        "shutdown_timeout",
        config.engine.shutdown_timeout,
    )?;
    require_non_zero(
        "engine",
        "engine",
        "pump_shutdown_timeout",
        config.engine.pump_shutdown_timeout,
    )
}

fn validate_metrics(config: &Config) -> Result<()> {
    if let Some(interval) = config.metrics.reporting_interval() {
        require_non_zero("metrics", "metrics", "interval", interval)?;
    }
    Ok(())
}

fn validate_subscribers(config: &Config) -> Result<()> {
    if config.subscribers.is_empty() {
        return Err(ConfigError::NoSubscribers);
    }

    let mut names = HashSet::new();
    for subscriber in &config.subscribers {
        if subscriber.name.trim().is_empty() {
            return Err(ConfigError::missing_field("subscriber", "", "name"));
        }
        if !names.insert(subscriber.name.as_str()) {
            return Err(ConfigError::duplicate_subscriber(&subscriber.name));
        }
        validate_subscriber(subscriber)?;
    }

    Ok(())
}

fn validate_subscriber(subscriber: &SubscriberConfig) -> Result<()> {
    let name = &subscriber.name;

    if subscriber.consumer.path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("consumer", name, "path"));
    }

    match subscriber.delivery.method {
        DeliveryMethod::Webhook => validate_webhook(name, &subscriber.delivery.webhook),
        DeliveryMethod::Bulk => validate_bulk(name, &subscriber.delivery.bulk),
    }
}

fn validate_webhook(name: &str, webhook: &WebhookConfig) -> Result<()> {
    if webhook.url.is_empty() {
        return Err(ConfigError::missing_field("webhook", name, "url"));
    }
    validate_http_url("webhook", name, &webhook.url)?;
    require_non_zero(
        "webhook",
        name,
        "callback_request_timeout",
        webhook.callback_request_timeout,
    )?;
    if webhook.max_retries > 0 {
        require_non_zero("webhook", name, "retry_interval", webhook.retry_interval)?;
    }
    Ok(())
}

fn validate_bulk(name: &str, bulk: &BulkConfig) -> Result<()> {
    if bulk.url.is_empty() {
        return Err(ConfigError::missing_field("bulk", name, "url"));
    }
    validate_http_url("bulk", name, &bulk.url)?;

    if bulk.index.is_empty() {
        return Err(ConfigError::missing_field("bulk", name, "index"));
    }
    if bulk.bulk_actions == 0 {
        return Err(ConfigError::invalid_value(
            "bulk",
            name,
            "bulk_actions",
            "must be greater than 0",
        ));
    }
    if bulk.queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "bulk",
            name,
            "queue_size",
            "must be greater than 0",
        ));
    }
    require_non_zero("bulk", name, "flush_interval", bulk.flush_interval)?;
    require_non_zero("bulk", name, "request_timeout", bulk.request_timeout)?;
    if bulk.initial_backoff > bulk.max_backoff {
        return Err(ConfigError::invalid_value(
            "bulk",
            name,
            "initial_backoff",
            "must not exceed max_backoff",
        ));
    }
    Ok(())
}

fn validate_http_url(component: &'static str, name: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::invalid_value(component, name, "url", e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid_value(
            component,
            name,
            "url",
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}

fn require_non_zero(
    component: &'static str,
    name: &str,
    field: &'static str,
    value: Duration,
) -> Result<()> {
    if value.is_zero() {
        return Err(ConfigError::invalid_value(
            component,
            name,
            field,
            "must be greater than 0",
        ));
    }
    Ok(())
}
