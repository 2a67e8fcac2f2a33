//! Error types for the purchase commit path.
//!
//! Every failure kind a caller can observe from the commit path is a distinct
//! variant of [`CommitError`], so the glue layer can map each one to its own
//! status code without string matching. Infrastructure failures from a
//! storage backend surface as [`StoreError`] and are wrapped unchanged.

use crate::types::RaffleId;
use thiserror::Error;

/// Errors reported by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure reported by the storage driver.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be mapped onto the domain model.
    #[error("invalid stored data: {0}")]
    Decode(String),

    /// The record is still referenced by dependent rows and cannot be removed.
    #[error("record in use: {0}")]
    InUse(String),
}

/// Errors surfaced by the purchase commit path.
///
/// Any of these aborts the surrounding transactional scope before it is
/// returned: no ticket row, purchase record or counter update from the failed
/// attempt remains visible.
#[derive(Error, Debug)]
pub enum CommitError {
    /// The referenced raffle does not exist. Not retryable without fixing
    /// the id.
    #[error("raffle not found: {0}")]
    RaffleNotFound(RaffleId),

    /// The raffle has ended and accepts no further purchases.
    #[error("raffle {0} is closed")]
    RaffleClosed(RaffleId),

    /// A purchase must request at least one ticket.
    #[error("ticket count must be at least 1")]
    InvalidQuantity,

    /// The requested quantity exceeds the remaining pool. The caller should
    /// reduce the quantity; `remaining` reports how many tickets are left.
    #[error("only {remaining} tickets remain, {requested} requested")]
    InsufficientAvailability {
        /// How many tickets the buyer asked for.
        requested: u32,
        /// How many tickets are actually left.
        remaining: u32,
    },

    /// The draw budget ran out before all numbers were assigned, typically
    /// under heavy contention on a nearly-full pool. Transient: the whole
    /// purchase can be retried.
    #[error(
        "could not assign all numbers ({assigned} of {requested} after {attempts} draws), retry"
    )]
    AllocationExhausted {
        /// How many tickets the buyer asked for.
        requested: u32,
        /// How many numbers were reserved before the budget ran out.
        assigned: u32,
        /// Total draw attempts spent.
        attempts: u32,
    },

    /// The payment reference was already used by another purchase — almost
    /// always a duplicate submission. Not retryable with the same reference.
    #[error("payment reference {0} has already been used")]
    DuplicateTransactionId(String),

    /// Unexpected storage failure. Fatal for this attempt; surfaced as a
    /// generic server error by the glue layer.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CommitError {
    /// Whether retrying the same request unchanged can succeed.
    ///
    /// Only budget exhaustion qualifies; every other failure needs the caller
    /// to change something first.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::AllocationExhausted { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn insufficient_availability_reports_remaining() {
        let error = CommitError::InsufficientAvailability {
            requested: 5,
            remaining: 2,
        };
        let display = format!("{error}");
        assert!(display.contains("only 2 tickets remain"));
        assert!(display.contains("5 requested"));
        assert!(!error.is_transient());
    }

    #[test]
    fn only_exhaustion_is_transient() {
        assert!(
            CommitError::AllocationExhausted {
                requested: 3,
                assigned: 1,
                attempts: 60,
            }
            .is_transient()
        );
        assert!(!CommitError::InvalidQuantity.is_transient());
        assert!(!CommitError::DuplicateTransactionId("ref-1".to_string()).is_transient());
        assert!(!CommitError::Storage(StoreError::Database("boom".to_string())).is_transient());
    }
}
