//! In-flight dispatch entries

use std::time::{Duration, Instant};

use herald_sources::{SourceError, SourceMessage};

use crate::metrics::DispatchMetrics;

/// A source message awaiting its delivery outcome
///
/// `ack` and `nack` consume the entry, so the message is settled at most once.
#[derive(Debug)]
pub struct DispatchEntry<M> {
    message: M,
    submitted_at: Instant,
}

impl<M: SourceMessage> DispatchEntry<M> {
    /// Wrap a message and start its latency timer
    pub fn new(message: M) -> Self {
        Self {
            message,
            submitted_at: Instant::now(),
        }
    }

    /// The stored source message
    #[inline]
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Time since the entry was created
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Acknowledge the message and record its latency
    pub fn ack(self, metrics: &DispatchMetrics) -> Result<(), SourceError> {
        metrics.record_latency(self.elapsed());
        self.message.ack()?;
        metrics.record_acked();
        Ok(())
    }

    /// Negatively acknowledge the message and record its latency
    pub fn nack(self, metrics: &DispatchMetrics) -> Result<(), SourceError> {
        metrics.record_latency(self.elapsed());
        self.message.nack()?;
        metrics.record_nacked();
        Ok(())
    }

    /// Drop the entry without settling the message
    pub fn into_message(self) -> M {
        self.message
    }
}
