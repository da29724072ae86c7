//! JSON metrics formatter
//!
//! Formats metrics as structured JSON for machine parsing.
//!
//! # Example Output
//!
//! ```json
//! {"type":"engine","subscriber":"app","delivery":"webhook","period_secs":60,
//!  "ack_rate":20.0,"totals":{"submitted":1200,"acked":1190,...}}
//! ```

use serde::Serialize;

use super::{EngineReport, MetricsFormatter};
use crate::EngineMetricsSnapshot;

/// JSON metrics formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct EngineJson<'a> {
    #[serde(rename = "type")]
    report_type: &'static str,
    subscriber: &'a str,
    delivery: &'a str,
    period_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_latency_us: Option<u64>,
    totals: &'a EngineMetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<&'a EngineMetricsSnapshot>,
}

impl MetricsFormatter for JsonFormatter {
    fn format_engine(&self, report: &EngineReport<'_>) -> String {
        let json = EngineJson {
            report_type: "engine",
            subscriber: report.subscriber,
            delivery: report.delivery,
            period_secs: report.period.as_secs(),
            ack_rate: report.ack_rate(),
            avg_latency_us: report.totals.avg_latency().map(|d| d.as_micros() as u64),
            totals: report.totals,
            delta: report.delta,
        };

        // Compact JSON, one object per log line
        serde_json::to_string(&json).unwrap_or_else(|_| "{}".to_string())
    }
}
