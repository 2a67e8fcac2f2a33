//! Storage seam for the purchase commit path.
//!
//! The allocator and coordinator never talk to a database directly; they run
//! against a [`PurchaseUnitOfWork`], a set of operations that a backend binds
//! to one transactional scope. All writes made through a unit of work become
//! visible together when the scope commits, or not at all.
//!
//! # Design
//!
//! Unique-constraint arbitration is the backend's job: `insert_ticket` and
//! `insert_purchase` report constraint outcomes as ordinary values
//! ([`TicketInsert`], [`PurchaseInsert`]) rather than driver errors, so the
//! core can treat a lost race as a collision to retry without knowing any
//! database error codes.
//!
//! # Implementations
//!
//! - `PgUnitOfWork` (in `rifa-postgres`): production implementation bound to
//!   a `PostgreSQL` transaction
//! - [`MemoryStore`](crate::memory::MemoryStore): deterministic in-memory
//!   backend for tests

use crate::error::StoreError;
use crate::types::{Purchase, Raffle, RaffleId, TicketNumber};
use async_trait::async_trait;

/// Outcome of attempting to reserve one ticket number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketInsert {
    /// The number was free and is now reserved by this scope.
    Reserved,
    /// The number is already held by another purchase (committed, or racing
    /// in a concurrent scope that won the constraint arbitration).
    AlreadyTaken,
}

/// Outcome of attempting to persist a purchase record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseInsert {
    /// The record was written.
    Inserted,
    /// Another purchase already used this transaction reference.
    DuplicateTransaction,
}

/// Operations the commit path performs inside one transactional scope.
///
/// Implementations bind every method to the same scope; the scope owner (the
/// transactional provider in the storage crate, or the test harness) decides
/// when the scope commits or rolls back.
#[async_trait]
pub trait PurchaseUnitOfWork: Send {
    /// Fetch a raffle by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn find_raffle(&mut self, id: RaffleId) -> Result<Option<Raffle>, StoreError>;

    /// Count the ticket rows already reserved for a raffle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn count_tickets(&mut self, raffle_id: RaffleId) -> Result<u32, StoreError>;

    /// Try to reserve one number for a raffle.
    ///
    /// The `(raffle, number)` uniqueness constraint arbitrates races: exactly
    /// one scope observes [`TicketInsert::Reserved`] for a given pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any failure other than losing the
    /// constraint arbitration.
    async fn insert_ticket(
        &mut self,
        raffle_id: RaffleId,
        number: &TicketNumber,
    ) -> Result<TicketInsert, StoreError>;

    /// Persist a purchase record with its granted numbers embedded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any failure other than a duplicate
    /// transaction reference.
    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<PurchaseInsert, StoreError>;

    /// Atomically add `quantity` to the raffle's sold counter, ending the
    /// raffle in the same statement if the pool is exhausted, and return the
    /// updated raffle.
    ///
    /// The increment must be a read-modify-write the backend cannot lose
    /// under concurrent commits (an atomic `sold = sold + n` update, not a
    /// write of a precomputed value).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure or if the raffle vanished
    /// mid-scope.
    async fn record_sale(
        &mut self,
        raffle_id: RaffleId,
        quantity: u32,
    ) -> Result<Raffle, StoreError>;
}
