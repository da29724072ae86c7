//! Human-readable metrics formatter
//!
//! # Example Output
//!
//! ```text
//! [metrics] app (webhook): acked 12.4K (20/s) | nacked 3 | retries 0 | dup 12 | corrupted 0 | latency 4.21ms
//! [metrics] search (bulk): acked 1.1M (1.2K/s) | nacked 0 | retries 41 | dup 0 | corrupted 0 | batches 2.4K req | abandoned 0
//! ```

use std::fmt::Write;

use super::{EngineReport, MetricsFormatter, format_count, format_latency, format_rate};

/// Human-readable metrics formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    /// Create a new human formatter
    pub fn new() -> Self {
        Self
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format_engine(&self, report: &EngineReport<'_>) -> String {
        let totals = report.totals;
        let mut output = format!(
            "[metrics] {} ({}): acked {}",
            report.subscriber,
            report.delivery,
            format_count(totals.acked)
        );

        if let Some(rate) = report.ack_rate() {
            let _ = write!(output, " ({})", format_rate(rate));
        }

        let _ = write!(
            output,
            " | nacked {} | retries {} | dup {} | corrupted {}",
            format_count(totals.nacked),
            format_count(totals.retries),
            format_count(totals.duplicates),
            format_count(totals.corrupted),
        );

        if totals.batch_requests > 0 {
            let _ = write!(output, " | batches {} req", format_count(totals.batch_requests));
        }
        if totals.failures > 0 {
            let _ = write!(output, " | failures {}", format_count(totals.failures));
        }
        if totals.unresolved > 0 {
            let _ = write!(output, " | unresolved {}", totals.unresolved);
        }
        if totals.abandoned > 0 {
            let _ = write!(output, " | abandoned {}", totals.abandoned);
        }
        if let Some(latency) = totals.avg_latency() {
            let _ = write!(output, " | latency {}", format_latency(latency));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineMetricsSnapshot;
    use std::time::Duration;

    #[test]
    fn test_format_engine_first_report() {
        let totals = EngineMetricsSnapshot {
            acked: 12_400,
            nacked: 3,
            duplicates: 12,
            latency_count: 2,
            latency_total_micros: 8_420,
            ..Default::default()
        };
        let report = EngineReport {
            subscriber: "app",
            delivery: "webhook",
            totals: &totals,
            delta: None,
            period: Duration::from_secs(60),
        };

        let output = HumanFormatter::new().format_engine(&report);
        assert!(output.starts_with("[metrics] app (webhook): acked 12.4K |"));
        assert!(output.contains("nacked 3"));
        assert!(output.contains("dup 12"));
        assert!(output.contains("latency 4.21ms"));
        assert!(!output.contains("batches"));
        assert!(!output.contains("abandoned"));
    }

    #[test]
    fn test_format_engine_with_rate_and_batches() {
        let totals = EngineMetricsSnapshot {
            acked: 5000,
            batch_requests: 5000,
            failures: 2,
            abandoned: 1,
            ..Default::default()
        };
        let delta = EngineMetricsSnapshot {
            acked: 1200,
            ..Default::default()
        };
        let report = EngineReport {
            subscriber: "search",
            delivery: "bulk",
            totals: &totals,
            delta: Some(&delta),
            period: Duration::from_secs(1),
        };

        let output = HumanFormatter::new().format_engine(&report);
        assert!(output.contains("acked 5.0K (1.2K/s)"));
        assert!(output.contains("batches 5.0K req"));
        assert!(output.contains("failures 2"));
        assert!(output.contains("abandoned 1"));
    }
}
