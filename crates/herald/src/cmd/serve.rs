//! Serve command - Run every configured subscriber
//!
//! Subscribers start in declaration order; any start failure stops the
//! ones already running and aborts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use herald_config::Config;
use herald_dispatch::StopOutcome;
use herald_metrics::MetricsReporter;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::load_config;
use crate::subscriber::Subscriber;

/// Run the serve command
pub async fn run(config: Option<PathBuf>) -> Result<()> {
    let (path, config) = load_config(config.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        config = %path.display(),
        "Herald starting"
    );

    if let Err(e) = run_server(config).await {
        error!(error = %e, "server error");
        return Err(e);
    }

    info!("Herald shutdown complete");
    Ok(())
}

/// Main server run loop
async fn run_server(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let mut subscribers = Vec::with_capacity(config.subscribers.len());
    for subscriber_config in &config.subscribers {
        let subscriber = Subscriber::build(subscriber_config, &config.engine)?;
        subscribers.push(subscriber);
    }

    if let Err(e) = start_all(&subscribers).await {
        stop_all(&mut subscribers, &config).await;
        return Err(e);
    }

    let metrics_task = if config.metrics.reporting_interval().is_some() {
        let handles = subscribers.iter().map(Subscriber::metrics_handle).collect();
        let reporter = MetricsReporter::new(config.metrics.clone(), handles);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            reporter.run(cancel).await;
        }))
    } else {
        info!("metrics reporting disabled");
        None
    };

    info!(
        subscriber_count = subscribers.len(),
        metrics_enabled = config.metrics.enabled,
        "Herald running"
    );

    wait_for_shutdown().await?;
    info!("shutdown signal received, stopping subscribers...");

    stop_all(&mut subscribers, &config).await;

    cancel.cancel();
    if let Some(task) = metrics_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "metrics reporter panicked");
    }

    Ok(())
}

/// Start subscribers in order, stopping at the first failure
async fn start_all(subscribers: &[Subscriber]) -> Result<()> {
    for subscriber in subscribers {
        subscriber
            .start()
            .await
            .with_context(|| format!("failed to start subscriber '{}'", subscriber.name()))?;
        info!(
            subscriber = %subscriber.name(),
            method = subscriber.method().as_str(),
            start_offset = subscriber.log().start_offset(),
            "subscriber started"
        );
    }
    Ok(())
}

/// Stop every subscriber, each bounded by the engine shutdown timeout
async fn stop_all(subscribers: &mut [Subscriber], config: &Config) {
    for subscriber in subscribers.iter_mut() {
        match subscriber.stop(config.engine.pump_shutdown_timeout).await {
            StopOutcome::Completed => {
                let snapshot = subscriber.metrics().snapshot();
                info!(
                    subscriber = %subscriber.name(),
                    acked = snapshot.acked,
                    nacked = snapshot.nacked,
                    abandoned = snapshot.abandoned,
                    "subscriber stopped"
                )
            }
            StopOutcome::TimedOut => {
                warn!(subscriber = %subscriber.name(), "subscriber stop timed out")
            }
            StopOutcome::AlreadyStopped => {}
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    Ok(())
}
