//! Report rendering, one line per subscriber

mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use std::time::Duration;

use crate::EngineMetricsSnapshot;

/// One engine's numbers for a reporting period
#[derive(Debug, Clone, Copy)]
pub struct EngineReport<'a> {
    /// Subscriber name
    pub subscriber: &'a str,
    /// Delivery strategy name
    pub delivery: &'a str,
    /// Totals since start
    pub totals: &'a EngineMetricsSnapshot,
    /// Growth since the previous report (absent on the first report)
    pub delta: Option<&'a EngineMetricsSnapshot>,
    /// Length of the reporting period
    pub period: Duration,
}

impl EngineReport<'_> {
    /// Acks per second over the period
    pub fn ack_rate(&self) -> Option<f64> {
        let delta = self.delta?;
        let secs = self.period.as_secs_f64();
        (secs > 0.0).then(|| delta.acked as f64 / secs)
    }
}

/// Trait for metrics formatters
pub trait MetricsFormatter: Send + Sync {
    /// Format one engine's report as a single line
    fn format_engine(&self, report: &EngineReport<'_>) -> String;
}

/// Scale a value to one decimal with a K or M suffix, `None` below 1000
fn scaled(value: f64) -> Option<String> {
    [(1e6, 'M'), (1e3, 'K')]
        .into_iter()
        .find(|(unit, _)| value >= *unit)
        .map(|(unit, suffix)| format!("{:.1}{suffix}", value / unit))
}

/// Counter with a K/M suffix once it passes a thousand
pub fn format_count(count: u64) -> String {
    scaled(count as f64).unwrap_or_else(|| count.to_string())
}

/// Per-second rate, same scaling as [`format_count`]
pub fn format_rate(rate: f64) -> String {
    let value = scaled(rate).unwrap_or_else(|| format!("{rate:.0}"));
    format!("{value}/s")
}

/// Format a latency in milliseconds with two decimals
pub fn format_latency(latency: Duration) -> String {
    format!("{:.2}ms", latency.as_secs_f64() * 1000.0)
}
