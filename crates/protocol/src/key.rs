//! Identity keys
//!
//! `IdentityKey` identifies one logical item for in-flight deduplication.
//! Keys are a pure function of the message location or of the event's
//! business identifiers, so the same logical item always maps to the same
//! key within an engine lifetime.

use std::fmt;

use serde::Deserialize;

use crate::event::ChangeEvent;

/// Deterministic key identifying one logical inbound item
///
/// # Example
///
/// ```
/// use herald_protocol::IdentityKey;
///
/// let key = IdentityKey::from_location(3, 1042);
/// assert_eq!(key.as_str(), "3-1042");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Create a key from an arbitrary string
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key derived from the message's position in the log
    pub fn from_location(partition: i32, offset: i64) -> Self {
        Self(format!("{partition}-{offset}"))
    }

    /// Key derived from the event's business identifiers
    ///
    /// The version is part of the key: two updates of the same run are
    /// different logical items.
    pub fn from_business(event: &ChangeEvent) -> Self {
        Self(format!(
            "{}:{}:{}:{}",
            event.domain_id, event.workflow_id, event.run_id, event.version
        ))
    }

    /// Get the key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the key is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for IdentityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How identity keys are derived for a subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// `{partition}-{offset}` (default)
    #[default]
    Location,
    /// `{domain}:{workflow}:{run}:{version}`
    Business,
}

impl KeyStrategy {
    /// Derive the key for a decoded event at a log position
    pub fn derive(&self, partition: i32, offset: i64, event: &ChangeEvent) -> IdentityKey {
        match self {
            Self::Location => IdentityKey::from_location(partition, offset),
            Self::Business => IdentityKey::from_business(event),
        }
    }

    /// Get the strategy as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Business => "business",
        }
    }
}
