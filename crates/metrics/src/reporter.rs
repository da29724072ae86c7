//! Periodic metrics reporter
//!
//! Collects a snapshot from every registered engine at the configured
//! interval and logs one formatted line per engine via tracing.

use std::sync::Arc;
use std::time::Instant;

use herald_config::{MetricsConfig, MetricsFormat};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::format::EngineReport;
use crate::{
    EngineMetricsProvider, EngineMetricsSnapshot, HumanFormatter, JsonFormatter, MetricsFormatter,
};

/// Metrics reporter for all engines
pub struct MetricsReporter {
    config: MetricsConfig,
    formatter: Box<dyn MetricsFormatter>,
    engines: Vec<Arc<dyn EngineMetricsProvider>>,
    previous: Vec<Option<EngineMetricsSnapshot>>,
    last_report: Option<Instant>,
}

impl MetricsReporter {
    /// Create a reporter for the given engines
    pub fn new(config: MetricsConfig, engines: Vec<Arc<dyn EngineMetricsProvider>>) -> Self {
        let formatter: Box<dyn MetricsFormatter> = match config.format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };
        let previous = vec![None; engines.len()];

        Self {
            config,
            formatter,
            engines,
            previous,
            last_report: None,
        }
    }

    /// Number of registered engines
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Run the reporter until cancellation
    ///
    /// Spawn this as a tokio task.
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately; skip it so the first report covers a full period
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval.as_secs(),
            format = ?self.config.format,
            engines = self.engines.len(),
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Final report so short runs still leave a record
                    self.report();
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Collect and log metrics once
    fn report(&mut self) {
        for line in self.render() {
            info!("{}", line);
        }
    }

    /// Collect one formatted line per engine and advance the baseline
    pub fn render(&mut self) -> Vec<String> {
        let now = Instant::now();
        let period = self
            .last_report
            .map(|last| now.duration_since(last))
            .unwrap_or(self.config.interval);

        let mut lines = Vec::with_capacity(self.engines.len());
        for (engine, previous) in self.engines.iter().zip(self.previous.iter_mut()) {
            let totals = engine.snapshot();
            let delta = previous.as_ref().map(|prev| totals.delta(prev));

            let report = EngineReport {
                subscriber: engine.subscriber(),
                delivery: engine.delivery(),
                totals: &totals,
                delta: delta.as_ref(),
                period,
            };
            lines.push(self.formatter.format_engine(&report));
            *previous = Some(totals);
        }

        self.last_report = Some(now);
        lines
    }
}
