//! Herald Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Every section is optional except `[[subscribers]]`.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use herald_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str(r#"
//! [[subscribers]]
//! name = "app"
//! consumer.path = "data/events.jsonl"
//! delivery.webhook.url = "http://localhost:8081/"
//! "#).unwrap();
//! assert_eq!(config.subscribers.len(), 1);
//! ```
//!
//! # Example Full Config
//!
//! See `configs/herald.toml` for all available options.

mod engine;
mod error;
mod logging;
mod metrics;
mod subscribers;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use engine::{DEFAULT_SHARD_COUNT, EngineConfig};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use subscribers::{
    BulkConfig, ConsumerConfig, DEFAULT_CONCURRENCY, DeliveryConfig, DeliveryMethod, FilterConfig,
    SubscriberConfig, WebhookConfig,
};

pub use herald_protocol::KeyStrategy;
pub use herald_sources::InitialOffset;

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Dispatch engine settings shared by all subscribers
    pub engine: EngineConfig,

    /// Notification subscribers
    pub subscribers: Vec<SubscriberConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Look up a subscriber by name
    pub fn subscriber(&self, name: &str) -> Option<&SubscriberConfig> {
        self.subscribers.iter().find(|s| s.name == name)
    }

    /// Names of all subscribers, in declaration order
    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name.as_str()).collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
