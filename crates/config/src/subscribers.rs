//! Subscriber configuration
//!
//! Each `[[subscribers]]` entry wires one inbound log to one delivery
//! method.
//!
//! # Example
//!
//! ```toml
//! [[subscribers]]
//! name = "billing"
//! key_strategy = "location"
//!
//! [subscribers.consumer]
//! path = "data/events.jsonl"
//! concurrency = 10
//!
//! [subscribers.delivery]
//! method = "webhook"
//!
//! [subscribers.delivery.webhook]
//! url = "http://localhost:8081/callback"
//!
//! [subscribers.filter]
//! selected_domains = ["billing-domain"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use herald_protocol::KeyStrategy;
use herald_sources::InitialOffset;
use serde::Deserialize;

/// Default number of workers per subscriber
pub const DEFAULT_CONCURRENCY: usize = 10;

/// One notification subscriber
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Unique subscriber name (used in logs and metrics)
    pub name: String,

    /// How identity keys are derived for deduplication
    /// Default: location
    pub key_strategy: KeyStrategy,

    /// Inbound log settings
    pub consumer: ConsumerConfig,

    /// Outbound delivery settings
    pub delivery: DeliveryConfig,

    /// Event filter
    pub filter: FilterConfig,
}

/// Inbound log consumer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Number of workers (0 means the default)
    /// Default: 10
    pub concurrency: usize,

    /// Consumer group name, used in logs
    pub consumer_group: Option<String>,

    /// Dead-letter file for permanently failed events
    pub dlq_path: Option<PathBuf>,

    /// Where to start without a committed offset (oldest, newest)
    /// Default: oldest
    pub initial_offset: InitialOffset,

    /// Newline-delimited event log to read
    pub path: PathBuf,

    /// Keep reading appended lines at end of file
    /// Default: true
    pub follow: bool,

    /// Buffered events between the reader and workers
    /// Default: 1000
    pub queue_size: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            consumer_group: None,
            dlq_path: None,
            initial_offset: InitialOffset::Oldest,
            path: PathBuf::new(),
            follow: true,
            queue_size: 1000,
        }
    }
}

impl ConsumerConfig {
    /// Worker count with 0 replaced by the default
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        }
    }
}

/// How notifications leave Herald
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// One HTTP callback per event (default)
    #[default]
    Webhook,
    /// Batched writes to a bulk-indexing backend
    Bulk,
}

impl DeliveryMethod {
    /// Get the method as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Bulk => "bulk",
        }
    }
}

/// Delivery settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Delivery method
    /// Default: webhook
    pub method: DeliveryMethod,

    /// Webhook settings (used when method = "webhook")
    pub webhook: WebhookConfig,

    /// Bulk settings (used when method = "bulk")
    pub bulk: BulkConfig,
}

/// Webhook delivery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Callback URL
    pub url: String,

    /// Wait between retries of a failed callback
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Retries after the first attempt (0 disables retry)
    /// Default: 0
    pub max_retries: u32,

    /// Per-request timeout
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub callback_request_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            retry_interval: Duration::from_secs(1),
            max_retries: 0,
            callback_request_timeout: Duration::from_secs(10),
        }
    }
}

/// Bulk delivery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Backend base URL (the `_bulk` path is appended)
    pub url: String,

    /// Target index
    pub index: String,

    /// Flush after this many requests
    /// Default: 1000
    pub bulk_actions: usize,

    /// Flush at least this often
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Retries for retryable item failures before reporting
    /// Default: 5
    pub max_retries: u32,

    /// First retry backoff
    /// Default: 200ms
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Backoff ceiling
    /// Default: 20s
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Per-request timeout
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Pending requests buffered before submitters wait
    /// Default: 10000
    pub queue_size: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            index: String::new(),
            bulk_actions: 1000,
            flush_interval: Duration::from_secs(1),
            max_retries: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            queue_size: 10_000,
        }
    }
}

/// Event filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Domains to deliver (empty = all)
    pub selected_domains: Vec<String>,
}

impl FilterConfig {
    /// Check if events of a domain pass the filter
    pub fn allows(&self, domain_id: &str) -> bool {
        self.selected_domains.is_empty() || self.selected_domains.iter().any(|d| d == domain_id)
    }
}
