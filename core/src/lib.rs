//! Rifa — raffle ticket sales core.
//!
//! This crate implements the correctness-critical heart of a raffle ticket
//! sales platform: reserving unique ticket numbers out of a bounded pool
//! under concurrent demand, and committing a purchase atomically with the
//! numbers it was granted.
//!
//! # Architecture
//!
//! ```text
//!  PurchaseInput
//!       │
//!       ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Coordinator   │────▶│    Allocator     │
//! │ (single-pass    │     │ (random draw +   │
//! │  commit flow)   │     │  retry on        │
//! └─────────────────┘     │  collision)      │
//!       │                 └──────────────────┘
//!       │                         │
//!       └────────────┬────────────┘
//!                    ▼
//!         ┌─────────────────────┐
//!         │ PurchaseUnitOfWork  │  one transactional scope:
//!         │ (storage seam)      │  all writes commit together
//!         └─────────────────────┘  or roll back together
//! ```
//!
//! # Key Properties
//!
//! - **Uniqueness**: every ticket is persisted one-at-a-time, so the storage
//!   layer's `(raffle, number)` constraint arbitrates races — two buyers
//!   drawing the same number see exactly one winner, and the loser redraws.
//! - **Bounded pool**: the allocator fails fast when a request exceeds the
//!   remaining pool and the draw budget caps work under contention.
//! - **Atomicity**: the coordinator runs inside a caller-owned scope; a
//!   failure at any step rolls back the tickets, the purchase record and the
//!   sold counter together.
//!
//! Storage backends implement [`store::PurchaseUnitOfWork`]; the production
//! `PostgreSQL` implementation lives in the `rifa-postgres` crate and an
//! in-memory backend for tests in [`memory`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocator;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use allocator::AllocatorPolicy;
pub use error::{CommitError, StoreError};
pub use store::{PurchaseInsert, PurchaseUnitOfWork, TicketInsert};
pub use types::{
    Money, NewRaffle, PaymentMethod, PaymentProof, Purchase, PurchaseId, PurchaseInput,
    PurchaseStatus, Raffle, RaffleId, RaffleStatus, TicketNumber,
};
