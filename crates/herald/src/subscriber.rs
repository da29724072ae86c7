//! Running subscribers
//!
//! One `Subscriber` per `[[subscribers]]` entry: a file log, a dispatch
//! engine, and for bulk delivery the bulk processor task feeding the
//! engine's adapter.

use std::sync::Arc;

use anyhow::{Context, Result};
use herald_config::{DeliveryMethod, EngineConfig, SubscriberConfig};
use herald_dispatch::{
    BatchObserver, BulkAdapter, ChangeEventInspector, DispatchError, DispatchMetrics, Engine,
    EngineState, StopOutcome,
};
use herald_metrics::EngineMetricsProvider;
use herald_sinks::bulk::{
    BulkProcessor, BulkRequest, BulkSettings, HttpBulkClient, NotificationIndexBuilder,
    key_resolver,
};
use herald_sinks::webhook::{NotificationBuilder, WebhookDelivery};
use herald_sources::{FileLog, FileLogConfig, FileMessage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type WebhookEngine = Engine<FileLog, NotificationBuilder, WebhookDelivery>;
type BulkEngine =
    Engine<FileLog, NotificationIndexBuilder, BulkAdapter<FileMessage, BulkRequest>>;

enum Runner {
    Webhook(WebhookEngine),
    Bulk {
        engine: BulkEngine,
        processor: Option<JoinHandle<()>>,
        cancel: CancellationToken,
    },
}

/// A configured subscriber
pub struct Subscriber {
    name: String,
    method: DeliveryMethod,
    log: Arc<FileLog>,
    runner: Runner,
}

impl Subscriber {
    /// Build a subscriber from its configuration
    ///
    /// Bulk subscribers spawn their processor here, so this must run inside
    /// a tokio runtime.
    pub fn build(config: &SubscriberConfig, engine_config: &EngineConfig) -> Result<Self> {
        let log = Arc::new(FileLog::new(file_log_config(config)));
        let metrics = Arc::new(DispatchMetrics::new());
        let concurrency = config.consumer.effective_concurrency();

        let runner = match config.delivery.method {
            DeliveryMethod::Webhook => {
                let delivery = WebhookDelivery::new(
                    &config.name,
                    &config.delivery.webhook,
                    Arc::clone(&metrics),
                )
                .with_context(|| format!("failed to create webhook for '{}'", config.name))?;
                let builder = NotificationBuilder::new(config.key_strategy)
                    .with_filter(config.filter.clone())
                    .with_metrics(Arc::clone(&metrics));

                let engine = Engine::new(
                    &config.name,
                    Arc::clone(&log),
                    Arc::new(builder),
                    Arc::new(delivery),
                    metrics,
                )
                .with_concurrency(concurrency)
                .with_shutdown_timeout(engine_config.shutdown_timeout);
                Runner::Webhook(engine)
            }
            DeliveryMethod::Bulk => {
                let bulk = &config.delivery.bulk;
                let client = HttpBulkClient::new(&bulk.url, bulk.request_timeout)
                    .with_context(|| format!("failed to create bulk client for '{}'", config.name))?;
                let settings =
                    BulkSettings::from(bulk).with_close_timeout(engine_config.pump_shutdown_timeout);
                let (processor, handle) = BulkProcessor::new(&config.name, settings, client);

                let adapter = Arc::new(
                    BulkAdapter::new(
                        &config.name,
                        Arc::new(handle),
                        key_resolver(),
                        engine_config.effective_shard_count(),
                        Arc::clone(&metrics),
                    )
                    .with_inspector(Arc::new(ChangeEventInspector)),
                );

                let cancel = CancellationToken::new();
                let observer: Arc<dyn BatchObserver<BulkRequest>> = Arc::clone(&adapter) as _;
                let processor = tokio::spawn(processor.run(observer, cancel.clone()));

                let builder = NotificationIndexBuilder::new(&bulk.index, config.key_strategy)
                    .with_filter(config.filter.clone())
                    .with_metrics(Arc::clone(&metrics));

                let engine = Engine::new(
                    &config.name,
                    Arc::clone(&log),
                    Arc::new(builder),
                    adapter,
                    metrics,
                )
                .with_concurrency(concurrency)
                .with_shutdown_timeout(engine_config.shutdown_timeout);
                Runner::Bulk {
                    engine,
                    processor: Some(processor),
                    cancel,
                }
            }
        };

        Ok(Self {
            name: config.name.clone(),
            method: config.delivery.method,
            log,
            runner,
        })
    }

    /// Subscriber name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery method
    pub fn method(&self) -> DeliveryMethod {
        self.method
    }

    /// Event log
    pub fn log(&self) -> &Arc<FileLog> {
        &self.log
    }

    /// Engine lifecycle state
    pub fn state(&self) -> EngineState {
        match &self.runner {
            Runner::Webhook(engine) => engine.state(),
            Runner::Bulk { engine, .. } => engine.state(),
        }
    }

    /// Engine metrics for the reporter
    pub fn metrics_handle(&self) -> Arc<dyn EngineMetricsProvider> {
        match &self.runner {
            Runner::Webhook(engine) => Arc::new(engine.metrics_handle()),
            Runner::Bulk { engine, .. } => Arc::new(engine.metrics_handle()),
        }
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        match &self.runner {
            Runner::Webhook(engine) => engine.metrics(),
            Runner::Bulk { engine, .. } => engine.metrics(),
        }
    }

    /// Start the engine
    pub async fn start(&self) -> Result<(), DispatchError> {
        match &self.runner {
            Runner::Webhook(engine) => engine.start().await,
            Runner::Bulk { engine, .. } => engine.start().await,
        }
    }

    /// Stop the engine, wait for the bulk processor and commit the log
    ///
    /// The offset is only committed for a subscriber that was running, so a
    /// failed start never rewinds the stored offset.
    pub async fn stop(&mut self, pump_timeout: std::time::Duration) -> StopOutcome {
        let was_started = self.state() == EngineState::Started;
        let outcome = match &mut self.runner {
            Runner::Webhook(engine) => engine.stop().await,
            Runner::Bulk {
                engine,
                processor,
                cancel,
            } => {
                let outcome = engine.stop().await;
                // the adapter closed the processor; cancel covers a close that timed out
                cancel.cancel();
                if let Some(task) = processor.take() {
                    match tokio::time::timeout(pump_timeout, task).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(subscriber = %self.name, error = %e, "bulk processor panicked"),
                        Err(_) => warn!(subscriber = %self.name, "bulk processor did not finish within timeout"),
                    }
                }
                outcome
            }
        };

        if was_started {
            match self.log.commit().await {
                Ok(offset) => info!(subscriber = %self.name, offset, "offset committed"),
                Err(e) => warn!(subscriber = %self.name, error = %e, "failed to commit offset"),
            }
        }
        outcome
    }
}

fn file_log_config(config: &SubscriberConfig) -> FileLogConfig {
    let consumer = &config.consumer;
    let name = consumer
        .consumer_group
        .clone()
        .unwrap_or_else(|| config.name.clone());

    let mut log = FileLogConfig::new(name, &consumer.path)
        .with_initial_offset(consumer.initial_offset)
        .with_follow(consumer.follow);
    if let Some(dlq) = &consumer.dlq_path {
        log = log.with_dlq_path(dlq);
    }
    log.queue_size = consumer.queue_size.max(1);
    log
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod subscriber_test;
