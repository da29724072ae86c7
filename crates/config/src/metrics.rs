//! `[metrics]` section
//!
//! Periodic per-subscriber counter reports written through `tracing`.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// How reports are rendered
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// One aligned line per subscriber
    #[default]
    Human,
    /// Structured fields
    Json,
}

/// Metrics reporter settings
///
/// ```toml
/// [metrics]
/// interval = "30s"
/// format = "json"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub format: MetricsFormat,
}

impl MetricsConfig {
    /// Report period, `None` when reporting is off
    pub fn reporting_interval(&self) -> Option<Duration> {
        self.enabled.then_some(self.interval)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_INTERVAL,
            format: MetricsFormat::default(),
        }
    }
}
