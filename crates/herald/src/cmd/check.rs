//! Check command - Validate a configuration file

use std::path::Path;

use anyhow::Result;
use herald_config::{Config, DeliveryMethod};

use super::load_config;

/// Run the check command
pub fn run(config: Option<&Path>) -> Result<()> {
    let (path, config) = load_config(config)?;
    println!("{}: ok", path.display());
    print!("{}", summary(&config));
    Ok(())
}

/// Human-readable summary of a loaded configuration
fn summary(config: &Config) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "engine: shard_count={} shutdown_timeout={:?} pump_shutdown_timeout={:?}\n",
        config.engine.effective_shard_count(),
        config.engine.shutdown_timeout,
        config.engine.pump_shutdown_timeout,
    ));
    match config.metrics.reporting_interval() {
        Some(interval) => out.push_str(&format!("metrics: every {interval:?}\n")),
        None => out.push_str("metrics: disabled\n"),
    }

    out.push_str(&format!("subscribers: {}\n", config.subscribers.len()));
    for subscriber in &config.subscribers {
        let target = match subscriber.delivery.method {
            DeliveryMethod::Webhook => subscriber.delivery.webhook.url.clone(),
            DeliveryMethod::Bulk => format!(
                "{} (index {})",
                subscriber.delivery.bulk.url, subscriber.delivery.bulk.index
            ),
        };
        out.push_str(&format!(
            "  - {} [{}] {} <- {} (concurrency {}, key {})\n",
            subscriber.name,
            subscriber.delivery.method.as_str(),
            target,
            subscriber.consumer.path.display(),
            subscriber.consumer.effective_concurrency(),
            subscriber.key_strategy.as_str(),
        ));
        if !subscriber.filter.selected_domains.is_empty() {
            out.push_str(&format!(
                "    domains: {}\n",
                subscriber.filter.selected_domains.join(", ")
            ));
        }
    }
    out
}
