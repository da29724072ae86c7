//! Engine settings
//!
//! Apply to every subscriber's dispatch engine.

use serde::Deserialize;
use std::time::Duration;

/// Default number of dispatch table shards
pub const DEFAULT_SHARD_COUNT: usize = 1024;

/// Dispatch engine configuration
///
/// # Example
///
/// ```toml
/// [engine]
/// shard_count = 1024
/// shutdown_timeout = "10s"
/// pump_shutdown_timeout = "60s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of dispatch table shards (0 is treated as 1)
    /// Default: 1024
    pub shard_count: usize,

    /// How long `stop` waits for workers to finish their current message
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// How long the bulk processor gets to flush and report its last batch
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub pump_shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            shutdown_timeout: Duration::from_secs(10),
            pump_shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Shard count with 0 clamped to 1
    pub fn effective_shard_count(&self) -> usize {
        self.shard_count.max(1)
    }
}
