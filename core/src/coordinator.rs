//! Purchase commit coordinator.
//!
//! Drives one purchase through its single-pass sequence: load the raffle,
//! check it is open, reserve the requested numbers, persist the purchase
//! record, then bump the raffle's sold counter (ending the raffle in the
//! same step when the pool is exhausted). There are no branching states and
//! no internal retries beyond the allocator's own bounded loop.
//!
//! The coordinator runs entirely inside a caller-owned transactional scope
//! and performs no side effects outside it — payment-proof upload happens
//! strictly before it is invoked. On any failure the caller rolls the scope
//! back, which also discards every ticket row the allocator persisted during
//! this call: a purchase and its numbers are never observed partially.

use crate::allocator::{self, AllocatorPolicy};
use crate::error::CommitError;
use crate::store::{PurchaseInsert, PurchaseUnitOfWork};
use crate::types::{Purchase, PurchaseInput, RaffleStatus};

/// Commit a purchase inside the caller's transactional scope.
///
/// On success the returned [`Purchase`] and all of its ticket rows have been
/// written through `uow`; they become visible when the caller commits the
/// scope.
///
/// # Errors
///
/// - [`CommitError::InvalidQuantity`] — zero tickets requested
/// - [`CommitError::RaffleNotFound`] — no raffle with the given id
/// - [`CommitError::RaffleClosed`] — the raffle has ended
/// - [`CommitError::InsufficientAvailability`] — the pool cannot cover the
///   request
/// - [`CommitError::AllocationExhausted`] — draw budget exhausted under
///   contention (transient; the buyer can retry)
/// - [`CommitError::DuplicateTransactionId`] — the payment reference was
///   already used
/// - [`CommitError::Storage`] — unexpected backend failure
#[tracing::instrument(
    skip(uow, policy, input),
    fields(raffle_id = %input.raffle_id, ticket_count = input.ticket_count)
)]
pub async fn commit<U>(
    uow: &mut U,
    policy: &AllocatorPolicy,
    input: PurchaseInput,
) -> Result<Purchase, CommitError>
where
    U: PurchaseUnitOfWork + ?Sized,
{
    if input.ticket_count == 0 {
        return Err(CommitError::InvalidQuantity);
    }

    let raffle = uow
        .find_raffle(input.raffle_id)
        .await?
        .ok_or(CommitError::RaffleNotFound(input.raffle_id))?;

    if !raffle.is_open() {
        return Err(CommitError::RaffleClosed(raffle.id));
    }

    let numbers = allocator::reserve(
        uow,
        raffle.id,
        input.ticket_count,
        raffle.total_tickets,
        raffle.number_width(),
        policy,
    )
    .await?;

    let purchase = Purchase::from_input(input, numbers);
    match uow.insert_purchase(&purchase).await? {
        PurchaseInsert::Inserted => {}
        PurchaseInsert::DuplicateTransaction => {
            return Err(CommitError::DuplicateTransactionId(purchase.transaction_id));
        }
    }

    let updated = uow.record_sale(raffle.id, purchase.ticket_count).await?;

    metrics::counter!("raffle.purchase.committed").increment(1);
    tracing::info!(
        purchase_id = %purchase.id,
        tickets = purchase.ticket_count,
        tickets_sold = updated.tickets_sold,
        ended = matches!(updated.status, RaffleStatus::Ended),
        "purchase committed"
    );

    Ok(purchase)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::{
        Money, NewRaffle, PaymentMethod, PaymentProof, PurchaseStatus, Raffle, RaffleId,
        TicketNumber,
    };
    use chrono::Utc;
    use std::collections::HashSet;

    fn raffle(total_tickets: u32) -> Raffle {
        Raffle::new(NewRaffle {
            title: "Weekend raffle".to_string(),
            description: Some("One winner takes all".to_string()),
            ticket_price: Money::from_cents(250),
            total_tickets,
            min_tickets_per_purchase: 1,
            prize_image_url: None,
            ends_at: Utc::now() + chrono::Duration::days(3),
        })
        .expect("valid raffle input")
    }

    fn input(raffle_id: RaffleId, ticket_count: u32, reference: &str) -> PurchaseInput {
        PurchaseInput {
            buyer_name: "Maria Perez".to_string(),
            buyer_phone: "+58 412 5550123".to_string(),
            raffle_id,
            amount: Money::from_cents(250 * u64::from(ticket_count)),
            ticket_count,
            payment_method: PaymentMethod::Transfer,
            transaction_id: reference.to_string(),
            receipt: PaymentProof {
                url: "https://media.example/receipts/abc.jpg".to_string(),
                storage_id: "receipts/abc".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn buying_the_whole_pool_closes_the_raffle() {
        let raffle = raffle(10);
        let raffle_id = raffle.id;
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle);

        let purchase = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 10, "ref-001"),
        )
        .await
        .expect("full-pool purchase should succeed");

        assert_eq!(purchase.ticket_count, 10);
        assert_eq!(purchase.ticket_numbers.len(), 10);
        assert_eq!(purchase.status, PurchaseStatus::Pending);
        let distinct: HashSet<&str> = purchase
            .ticket_numbers
            .iter()
            .map(TicketNumber::as_str)
            .collect();
        assert_eq!(distinct.len(), 10);

        let updated = store.raffle(raffle_id).unwrap();
        assert_eq!(updated.tickets_sold, 10);
        assert_eq!(updated.status, RaffleStatus::Ended);
    }

    #[tokio::test]
    async fn ended_raffle_rejects_purchases() {
        let mut raffle = raffle(5);
        let raffle_id = raffle.id;
        raffle.tickets_sold = 5;
        raffle.status = RaffleStatus::Ended;
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle);

        let result = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 1, "ref-002"),
        )
        .await;

        assert!(matches!(result, Err(CommitError::RaffleClosed(id)) if id == raffle_id));
        assert!(store.purchases().is_empty());
    }

    #[tokio::test]
    async fn unknown_raffle_is_reported() {
        let mut store = MemoryStore::new();
        let missing = RaffleId::new();

        let result = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(missing, 1, "ref-003"),
        )
        .await;

        assert!(matches!(result, Err(CommitError::RaffleNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn zero_tickets_is_rejected_before_any_storage_access() {
        let mut store = MemoryStore::new();

        let result = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(RaffleId::new(), 0, "ref-004"),
        )
        .await;

        assert!(matches!(result, Err(CommitError::InvalidQuantity)));
    }

    #[tokio::test]
    async fn duplicate_payment_reference_fails_the_second_purchase() {
        let raffle = raffle(100);
        let raffle_id = raffle.id;
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle);

        commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 3, "ref-005"),
        )
        .await
        .expect("first purchase should succeed");

        let result = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 2, "ref-005"),
        )
        .await;

        assert!(matches!(
            result,
            Err(CommitError::DuplicateTransactionId(ref reference)) if reference == "ref-005"
        ));
        // Only the first purchase exists and only its sale was recorded.
        assert_eq!(store.purchases().len(), 1);
        assert_eq!(store.raffle(raffle_id).unwrap().tickets_sold, 3);
    }

    #[tokio::test]
    async fn paused_raffle_still_commits() {
        let mut raffle = raffle(20);
        let raffle_id = raffle.id;
        raffle.status = RaffleStatus::Paused;
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle);

        let purchase = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 2, "ref-006"),
        )
        .await
        .expect("paused raffle should still accept an in-flight purchase");

        assert_eq!(purchase.ticket_numbers.len(), 2);
        assert_eq!(store.raffle(raffle_id).unwrap().tickets_sold, 2);
    }

    #[tokio::test]
    async fn insufficient_pool_reports_remaining_and_persists_nothing() {
        let raffle = raffle(100);
        let raffle_id = raffle.id;
        let width = raffle.number_width();
        let mut store = MemoryStore::new();
        store.insert_raffle(raffle);
        store.preassign(raffle_id, (0..98).map(|n| TicketNumber::format(n, width)));

        let result = commit(
            &mut store,
            &AllocatorPolicy::default(),
            input(raffle_id, 5, "ref-007"),
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
        assert!(store.purchases().is_empty());
        assert_eq!(store.ticket_count(raffle_id), 98);
    }
}
