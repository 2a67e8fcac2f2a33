//! Ticket number allocator.
//!
//! Reserves unique, zero-padded ticket numbers out of a raffle's bounded
//! pool using random draws with retry-on-collision. Each drawn number is
//! persisted immediately through the unit of work, so the storage layer's
//! uniqueness constraint arbitrates concurrent draws: when two scopes race
//! for the same number exactly one wins and the loser redraws. No in-process
//! lock is involved.
//!
//! The draw budget is bounded (`quantity x attempts_per_ticket`), so a
//! nearly-full pool under heavy contention fails fast with a retryable error
//! instead of spinning. Collisions are counted through `metrics`; a rising
//! collision rate is the operator's early warning that a pool is close to
//! exhaustion.

use crate::error::CommitError;
use crate::store::{PurchaseUnitOfWork, TicketInsert};
use crate::types::{RaffleId, TicketNumber};
use rand::Rng;
use std::collections::HashSet;

/// Tuning for the allocator's bounded retry loop.
///
/// The budget is a total draw count for the whole reservation, not a
/// per-number one: `quantity x attempts_per_ticket` draws. The default 20x
/// margin keeps the expected number of draws low for typical fill ratios
/// while still riding out bursts of collisions on a busy pool.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorPolicy {
    /// Draw attempts granted per requested ticket.
    pub attempts_per_ticket: u32,
}

impl Default for AllocatorPolicy {
    fn default() -> Self {
        Self {
            attempts_per_ticket: 20,
        }
    }
}

impl AllocatorPolicy {
    /// Create a policy with a custom per-ticket attempt budget.
    #[must_use]
    pub const fn new(attempts_per_ticket: u32) -> Self {
        Self { attempts_per_ticket }
    }

    /// Total draw budget for a reservation of `quantity` tickets.
    #[must_use]
    pub const fn budget(&self, quantity: u32) -> u32 {
        quantity.saturating_mul(self.attempts_per_ticket)
    }
}

/// Draw a uniform number in `[0, capacity)`.
///
/// Kept out of the async loop so the thread-local RNG is never held across
/// an await point.
fn draw(capacity: u32) -> u32 {
    rand::thread_rng().gen_range(0..capacity)
}

/// Reserve `quantity` unique ticket numbers for a raffle.
///
/// Fails fast with `InsufficientAvailability` when the pool cannot cover the
/// request; never attempts a partial allocation. On success every returned
/// number has been persisted through `uow` and is held by the surrounding
/// transactional scope.
///
/// # Errors
///
/// - [`CommitError::InsufficientAvailability`] — fewer than `quantity`
///   tickets remain; nothing was reserved
/// - [`CommitError::AllocationExhausted`] — the draw budget ran out under
///   contention; the caller should roll back and let the buyer retry
/// - [`CommitError::Storage`] — the backend failed for any reason other
///   than constraint arbitration
pub async fn reserve<U>(
    uow: &mut U,
    raffle_id: RaffleId,
    quantity: u32,
    capacity: u32,
    width: usize,
    policy: &AllocatorPolicy,
) -> Result<Vec<TicketNumber>, CommitError>
where
    U: PurchaseUnitOfWork + ?Sized,
{
    let sold = uow.count_tickets(raffle_id).await?;
    let remaining = capacity.saturating_sub(sold);
    if quantity > remaining {
        return Err(CommitError::InsufficientAvailability {
            requested: quantity,
            remaining,
        });
    }

    let budget = policy.budget(quantity);
    let mut reserved = Vec::with_capacity(quantity as usize);
    let mut assigned: u32 = 0;
    // Numbers already handled in this call: reserved by us, or observed
    // taken. Either way a redraw is cheaper than another insert.
    let mut seen: HashSet<String> = HashSet::new();
    let mut attempts: u32 = 0;
    let mut collisions: u32 = 0;

    while assigned < quantity && attempts < budget {
        attempts += 1;

        let number = TicketNumber::format(draw(capacity), width);
        if !seen.insert(number.as_str().to_string()) {
            continue;
        }

        match uow.insert_ticket(raffle_id, &number).await? {
            TicketInsert::Reserved => {
                assigned += 1;
                reserved.push(number);
            }
            TicketInsert::AlreadyTaken => {
                collisions += 1;
                metrics::counter!("raffle.allocator.collisions").increment(1);
                tracing::debug!(
                    raffle_id = %raffle_id,
                    number = number.as_str(),
                    "ticket number collision, redrawing"
                );
            }
        }
    }

    if assigned < quantity {
        metrics::counter!("raffle.allocator.exhausted").increment(1);
        tracing::warn!(
            raffle_id = %raffle_id,
            requested = quantity,
            assigned,
            attempts,
            collisions,
            "allocation draw budget exhausted"
        );
        return Err(CommitError::AllocationExhausted {
            requested: quantity,
            assigned,
            attempts,
        });
    }

    if collisions > 0 {
        tracing::debug!(
            raffle_id = %raffle_id,
            requested = quantity,
            attempts,
            collisions,
            "allocation completed after collisions"
        );
    }

    Ok(reserved)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::store::PurchaseInsert;
    use crate::types::{Money, NewRaffle, Purchase, Raffle};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;

    fn raffle(total_tickets: u32) -> Raffle {
        Raffle::new(NewRaffle {
            title: "Test raffle".to_string(),
            description: None,
            ticket_price: Money::from_cents(100),
            total_tickets,
            min_tickets_per_purchase: 1,
            prize_image_url: None,
            ends_at: Utc::now() + chrono::Duration::days(7),
        })
        .expect("valid raffle input")
    }

    /// Backend where every number is already taken; `count_tickets` still
    /// reports an empty pool so the availability precheck passes.
    struct FullyContendedStore;

    #[async_trait]
    impl PurchaseUnitOfWork for FullyContendedStore {
        async fn find_raffle(&mut self, _id: RaffleId) -> Result<Option<Raffle>, StoreError> {
            Ok(None)
        }

        async fn count_tickets(&mut self, _raffle_id: RaffleId) -> Result<u32, StoreError> {
            Ok(0)
        }

        async fn insert_ticket(
            &mut self,
            _raffle_id: RaffleId,
            _number: &TicketNumber,
        ) -> Result<TicketInsert, StoreError> {
            Ok(TicketInsert::AlreadyTaken)
        }

        async fn insert_purchase(
            &mut self,
            _purchase: &Purchase,
        ) -> Result<PurchaseInsert, StoreError> {
            Ok(PurchaseInsert::Inserted)
        }

        async fn record_sale(
            &mut self,
            _raffle_id: RaffleId,
            _quantity: u32,
        ) -> Result<Raffle, StoreError> {
            Err(StoreError::Database("not under test".to_string()))
        }
    }

    #[tokio::test]
    async fn reserves_the_entire_pool_with_unique_numbers() {
        let raffle = raffle(10);
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle.clone());

        let numbers = reserve(
            &mut store,
            raffle.id,
            10,
            raffle.total_tickets,
            raffle.number_width(),
            &AllocatorPolicy::default(),
        )
        .await
        .expect("full-pool reservation should succeed");

        assert_eq!(numbers.len(), 10);
        let distinct: HashSet<&str> = numbers.iter().map(TicketNumber::as_str).collect();
        assert_eq!(distinct.len(), 10, "numbers must be unique");
        for number in &numbers {
            assert_eq!(number.as_str().len(), 1, "capacity 10 pads to one digit");
            let raw: u32 = number.as_str().parse().unwrap();
            assert!(raw < 10);
        }
        assert_eq!(store.ticket_count(raffle.id), 10);
    }

    #[tokio::test]
    async fn fails_fast_when_pool_cannot_cover_request() {
        let raffle = raffle(100);
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle.clone());
        let width = raffle.number_width();
        store.preassign(raffle.id, (0..98).map(|n| TicketNumber::format(n, width)));

        let result = reserve(
            &mut store,
            raffle.id,
            5,
            raffle.total_tickets,
            width,
            &AllocatorPolicy::default(),
        )
        .await;

        match result {
            Err(CommitError::InsufficientAvailability {
                requested,
                remaining,
            }) => {
                assert_eq!(requested, 5);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected InsufficientAvailability, got {other:?}"),
        }
        // Fail-fast means no partial allocation happened.
        assert_eq!(store.ticket_count(raffle.id), 98);
    }

    #[tokio::test]
    async fn picks_the_free_numbers_in_a_nearly_full_pool() {
        let raffle = raffle(100);
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle.clone());
        let width = raffle.number_width();
        store.preassign(raffle.id, (0..98).map(|n| TicketNumber::format(n, width)));

        // Generous budget: only "98" and "99" are free out of 100.
        let numbers = reserve(
            &mut store,
            raffle.id,
            2,
            raffle.total_tickets,
            width,
            &AllocatorPolicy::new(500),
        )
        .await
        .expect("the two free numbers should be found");

        let mut found: Vec<&str> = numbers.iter().map(TicketNumber::as_str).collect();
        found.sort_unstable();
        assert_eq!(found, vec!["98", "99"]);
    }

    #[tokio::test]
    async fn exhausts_budget_when_every_draw_collides() {
        let mut store = FullyContendedStore;
        let policy = AllocatorPolicy::default();

        let result = reserve(&mut store, RaffleId::new(), 3, 1_000, 3, &policy).await;

        match result {
            Err(CommitError::AllocationExhausted {
                requested,
                assigned,
                attempts,
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(assigned, 0);
                assert_eq!(attempts, policy.budget(3));
            }
            other => panic!("expected AllocationExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_ticket_pool_yields_number_zero() {
        let raffle = raffle(1);
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle.clone());

        let numbers = reserve(
            &mut store,
            raffle.id,
            1,
            raffle.total_tickets,
            raffle.number_width(),
            &AllocatorPolicy::default(),
        )
        .await
        .expect("single-ticket reservation should succeed");

        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].as_str(), "0");
    }
}
