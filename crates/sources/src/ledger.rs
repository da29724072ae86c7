//! Acknowledgment ledger
//!
//! Records the terminal outcome of every message a stream handed out. The
//! memory log exposes it for assertions; the file log derives its committed
//! watermark from it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Terminal outcome of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Processed successfully
    Acked,
    /// Failed permanently
    Nacked,
}

/// Shared record of acknowledgment outcomes keyed by `(partition, offset)`
///
/// Every call is recorded, so a message acknowledged twice shows up with two
/// outcomes. Cloning shares the same ledger.
#[derive(Debug, Clone, Default)]
pub struct AckLedger {
    inner: Arc<Mutex<BTreeMap<(i32, i64), Vec<AckOutcome>>>>,
}

impl AckLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome
    pub fn record(&self, partition: i32, offset: i64, outcome: AckOutcome) {
        self.inner
            .lock()
            .entry((partition, offset))
            .or_default()
            .push(outcome);
    }

    /// All outcomes recorded for a message, in call order
    pub fn outcomes(&self, partition: i32, offset: i64) -> Vec<AckOutcome> {
        self.inner
            .lock()
            .get(&(partition, offset))
            .cloned()
            .unwrap_or_default()
    }

    /// First outcome recorded for a message
    pub fn outcome(&self, partition: i32, offset: i64) -> Option<AckOutcome> {
        self.inner
            .lock()
            .get(&(partition, offset))
            .and_then(|v| v.first().copied())
    }

    /// Number of ack calls across all messages
    pub fn acked_count(&self) -> usize {
        self.count(AckOutcome::Acked)
    }

    /// Number of nack calls across all messages
    pub fn nacked_count(&self) -> usize {
        self.count(AckOutcome::Nacked)
    }

    /// Number of distinct messages with at least one outcome
    pub fn settled_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if any message was acknowledged more than once
    pub fn has_duplicates(&self) -> bool {
        self.inner.lock().values().any(|v| v.len() > 1)
    }

    /// Next offset after the contiguous run of settled messages starting at `from`
    ///
    /// This is the offset a consumer can safely resume from: everything
    /// before it has a terminal outcome.
    pub fn watermark(&self, partition: i32, from: i64) -> i64 {
        let inner = self.inner.lock();
        let mut next = from;
        for (&(p, offset), _) in inner.range((partition, from)..=(partition, i64::MAX)) {
            if p != partition || offset != next {
                break;
            }
            next += 1;
        }
        next
    }

    fn count(&self, outcome: AckOutcome) -> usize {
        self.inner
            .lock()
            .values()
            .flat_map(|v| v.iter())
            .filter(|o| **o == outcome)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_counts() {
        let ledger = AckLedger::new();
        ledger.record(0, 0, AckOutcome::Acked);
        ledger.record(0, 1, AckOutcome::Nacked);
        ledger.record(1, 0, AckOutcome::Acked);

        assert_eq!(ledger.acked_count(), 2);
        assert_eq!(ledger.nacked_count(), 1);
        assert_eq!(ledger.settled_count(), 3);
        assert_eq!(ledger.outcome(0, 1), Some(AckOutcome::Nacked));
        assert_eq!(ledger.outcome(0, 2), None);
        assert!(!ledger.has_duplicates());
    }

    #[test]
    fn test_duplicate_outcomes_are_kept() {
        let ledger = AckLedger::new();
        ledger.record(0, 5, AckOutcome::Acked);
        ledger.record(0, 5, AckOutcome::Nacked);

        assert_eq!(
            ledger.outcomes(0, 5),
            vec![AckOutcome::Acked, AckOutcome::Nacked]
        );
        assert!(ledger.has_duplicates());
    }

    #[test]
    fn test_watermark_stops_at_gap() {
        let ledger = AckLedger::new();
        for offset in [0, 1, 2, 4, 5] {
            ledger.record(0, offset, AckOutcome::Acked);
        }
        ledger.record(1, 3, AckOutcome::Acked);

        assert_eq!(ledger.watermark(0, 0), 3);
        assert_eq!(ledger.watermark(0, 4), 6);
        assert_eq!(ledger.watermark(0, 3), 3);
        assert_eq!(ledger.watermark(1, 0), 0);
        assert_eq!(ledger.watermark(1, 3), 4);
    }

    #[test]
    fn test_clone_shares_state() {
        let ledger = AckLedger::new();
        let other = ledger.clone();
        other.record(2, 9, AckOutcome::Acked);
        assert_eq!(ledger.acked_count(), 1);
    }
}
