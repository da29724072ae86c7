//! Per-item result classification
//!
//! Maps an HTTP-style status code from the batched backend to what the
//! engine does with the item.

/// Statuses the backend may succeed on when the item is submitted again
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [
    408, // request timeout
    429, // too many requests
    500, // internal server error
    503, // service unavailable
    507, // insufficient storage
];

/// What to do with one item result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Delivered (or nothing left to deliver): acknowledge
    Success,
    /// Transient: leave pending for a later result
    Retryable,
    /// Will never succeed: negatively acknowledge
    Permanent,
}

/// Classify a per-item status code
///
/// 2xx is success. 404 (document already gone) and 409 (a newer version is
/// already stored) are also success: nothing left to do for that item.
pub fn classify(status: u16) -> Classification {
    match status {
        200..=299 | 404 | 409 => Classification::Success,
        s if is_retryable(s) => Classification::Retryable,
        _ => Classification::Permanent,
    }
}

/// Check if a status is in the retryable set
#[inline]
pub fn is_retryable(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}
