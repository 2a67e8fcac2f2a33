//! In-memory storage backend for deterministic tests.
//!
//! [`MemoryStore`] implements [`PurchaseUnitOfWork`] over plain hash maps so
//! allocator and coordinator logic can be exercised without a database. It is
//! **not transactional**: writes land immediately and a failed commit leaves
//! them in place. Atomicity and rollback are properties of the production
//! backend and are covered by its integration tests.

use crate::error::StoreError;
use crate::store::{PurchaseInsert, PurchaseUnitOfWork, TicketInsert};
use crate::types::{Purchase, Raffle, RaffleId, TicketNumber};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// Hash-map-backed [`PurchaseUnitOfWork`] for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raffles: HashMap<RaffleId, Raffle>,
    tickets: HashMap<RaffleId, BTreeSet<String>>,
    purchases: Vec<Purchase>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raffle.
    pub fn insert_raffle(&mut self, raffle: Raffle) {
        self.raffles.insert(raffle.id, raffle);
    }

    /// Look up a seeded raffle.
    #[must_use]
    pub fn raffle(&self, id: RaffleId) -> Option<&Raffle> {
        self.raffles.get(&id)
    }

    /// Number of ticket rows held for a raffle.
    #[must_use]
    pub fn ticket_count(&self, raffle_id: RaffleId) -> usize {
        self.tickets.get(&raffle_id).map_or(0, BTreeSet::len)
    }

    /// The numbers held for a raffle, in sorted order.
    #[must_use]
    pub fn numbers(&self, raffle_id: RaffleId) -> Vec<String> {
        self.tickets
            .get(&raffle_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Mark numbers as already taken, as if reserved by earlier purchases.
    pub fn preassign(
        &mut self,
        raffle_id: RaffleId,
        numbers: impl IntoIterator<Item = TicketNumber>,
    ) {
        let pool = self.tickets.entry(raffle_id).or_default();
        for number in numbers {
            pool.insert(number.into());
        }
    }

    /// All purchases persisted so far, in insertion order.
    #[must_use]
    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }
}

#[async_trait]
impl PurchaseUnitOfWork for MemoryStore {
    async fn find_raffle(&mut self, id: RaffleId) -> Result<Option<Raffle>, StoreError> {
        Ok(self.raffles.get(&id).cloned())
    }

    async fn count_tickets(&mut self, raffle_id: RaffleId) -> Result<u32, StoreError> {
        u32::try_from(self.ticket_count(raffle_id))
            .map_err(|e| StoreError::Decode(format!("ticket count overflow: {e}")))
    }

    async fn insert_ticket(
        &mut self,
        raffle_id: RaffleId,
        number: &TicketNumber,
    ) -> Result<TicketInsert, StoreError> {
        let pool = self.tickets.entry(raffle_id).or_default();
        if pool.insert(number.as_str().to_string()) {
            Ok(TicketInsert::Reserved)
        } else {
            Ok(TicketInsert::AlreadyTaken)
        }
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<PurchaseInsert, StoreError> {
        if self
            .purchases
            .iter()
            .any(|existing| existing.transaction_id == purchase.transaction_id)
        {
            return Ok(PurchaseInsert::DuplicateTransaction);
        }
        self.purchases.push(purchase.clone());
        Ok(PurchaseInsert::Inserted)
    }

    async fn record_sale(
        &mut self,
        raffle_id: RaffleId,
        quantity: u32,
    ) -> Result<Raffle, StoreError> {
        let raffle = self
            .raffles
            .get_mut(&raffle_id)
            .ok_or_else(|| StoreError::Database(format!("raffle {raffle_id} vanished")))?;
        raffle.register_sale(quantity);
        Ok(raffle.clone())
    }
}
