//! Transactional purchase commit.
//!
//! [`PurchaseCommitter`] is the transactional scope provider for the commit
//! path: it opens one `PostgreSQL` transaction, runs the core coordinator
//! against a [`PgUnitOfWork`] bound to that transaction, and commits or rolls
//! back as a whole. The ticket rows, the purchase record and the raffle's
//! sold counter always become visible together or not at all.
//!
//! # Concurrency
//!
//! No in-process locks. The composite primary key on `tickets` arbitrates
//! concurrent number claims, and it serializes only *colliding* claims —
//! non-colliding allocations against the same raffle proceed fully in
//! parallel. The sold counter is advanced with an atomic in-place `UPDATE`,
//! so concurrent commits cannot lose increments.

use crate::rows::{self, db_error};
use async_trait::async_trait;
use rifa_core::store::{PurchaseInsert, PurchaseUnitOfWork, TicketInsert};
use rifa_core::{
    AllocatorPolicy, CommitError, Purchase, PurchaseInput, Raffle, RaffleId, StoreError,
    TicketNumber, coordinator,
};
use sqlx::{PgPool, Postgres, Transaction};

/// Runs purchase commits against `PostgreSQL`, one transaction per purchase.
pub struct PurchaseCommitter {
    pool: PgPool,
    policy: AllocatorPolicy,
}

impl PurchaseCommitter {
    /// Create a committer with the default allocation policy.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_policy(pool, AllocatorPolicy::default())
    }

    /// Create a committer with a custom allocation policy.
    #[must_use]
    pub const fn with_policy(pool: PgPool, policy: AllocatorPolicy) -> Self {
        Self { pool, policy }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Commit one purchase atomically.
    ///
    /// Opens a transaction, reserves the requested ticket numbers, persists
    /// the purchase and advances the raffle's sold counter (ending the raffle
    /// if this purchase exhausts the pool), then commits. Any failure rolls
    /// the whole scope back, including ticket rows already reserved during
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns the coordinator's [`CommitError`] taxonomy unchanged; see
    /// [`rifa_core::coordinator::commit`].
    #[tracing::instrument(skip(self, input), fields(raffle_id = %input.raffle_id))]
    pub async fn commit(&self, input: PurchaseInput) -> Result<Purchase, CommitError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = {
            let mut uow = PgUnitOfWork::new(&mut tx);
            coordinator::commit(&mut uow, &self.policy, input).await
        };

        match result {
            Ok(purchase) => {
                tx.commit().await.map_err(db_error)?;
                Ok(purchase)
            }
            Err(error) => {
                metrics::counter!("raffle.purchase.failed").increment(1);
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(
                        error = %rollback_error,
                        "rollback failed after aborted purchase commit"
                    );
                }
                tracing::info!(error = %error, "purchase commit rolled back");
                Err(error)
            }
        }
    }
}

/// [`PurchaseUnitOfWork`] bound to one `PostgreSQL` transaction.
///
/// Every operation runs on the same transaction; nothing is visible to other
/// connections until the owner commits.
pub struct PgUnitOfWork<'a, 't> {
    tx: &'a mut Transaction<'t, Postgres>,
}

impl<'a, 't> PgUnitOfWork<'a, 't> {
    /// Bind a unit of work to an open transaction.
    pub const fn new(tx: &'a mut Transaction<'t, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl PurchaseUnitOfWork for PgUnitOfWork<'_, '_> {
    async fn find_raffle(&mut self, id: RaffleId) -> Result<Option<Raffle>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, ticket_price, total_tickets, tickets_sold,
                   min_tickets_per_purchase, status, winner, winner_image_url,
                   prize_image_url, ends_at, created_at, updated_at
            FROM raffles
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **self.tx)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rows::row_to_raffle).transpose()
    }

    async fn count_tickets(&mut self, raffle_id: RaffleId) -> Result<u32, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE raffle_id = $1")
            .bind(raffle_id.as_uuid())
            .fetch_one(&mut **self.tx)
            .await
            .map_err(db_error)?;

        u32::try_from(count).map_err(|e| StoreError::Decode(format!("ticket count overflow: {e}")))
    }

    async fn insert_ticket(
        &mut self,
        raffle_id: RaffleId,
        number: &TicketNumber,
    ) -> Result<TicketInsert, StoreError> {
        // A raw constraint error would abort the surrounding transaction, so
        // conflicts are absorbed with DO NOTHING and detected via the row
        // count. The primary key still arbitrates concurrent claims: a racing
        // insert blocks until the holder's transaction resolves, then reports
        // zero rows if the number stayed taken.
        let result = sqlx::query(
            r"
            INSERT INTO tickets (raffle_id, number)
            VALUES ($1, $2)
            ON CONFLICT (raffle_id, number) DO NOTHING
            ",
        )
        .bind(raffle_id.as_uuid())
        .bind(number.as_str())
        .execute(&mut **self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            Ok(TicketInsert::AlreadyTaken)
        } else {
            Ok(TicketInsert::Reserved)
        }
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<PurchaseInsert, StoreError> {
        let amount = i64::try_from(purchase.amount.cents())
            .map_err(|e| StoreError::Decode(format!("amount overflow: {e}")))?;
        let ticket_count = i32::try_from(purchase.ticket_count)
            .map_err(|e| StoreError::Decode(format!("ticket count overflow: {e}")))?;
        let numbers: Vec<String> = purchase
            .ticket_numbers
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();

        let result = sqlx::query(
            r"
            INSERT INTO purchases (
                id, raffle_id, buyer_name, buyer_phone, amount, ticket_count,
                payment_method, status, transaction_id, ticket_numbers,
                receipt_url, receipt_storage_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (transaction_id) DO NOTHING
            ",
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.raffle_id.as_uuid())
        .bind(&purchase.buyer_name)
        .bind(&purchase.buyer_phone)
        .bind(amount)
        .bind(ticket_count)
        .bind(purchase.payment_method.as_str())
        .bind(purchase.status.as_str())
        .bind(&purchase.transaction_id)
        .bind(&numbers)
        .bind(&purchase.receipt.url)
        .bind(&purchase.receipt.storage_id)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut **self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            Ok(PurchaseInsert::DuplicateTransaction)
        } else {
            Ok(PurchaseInsert::Inserted)
        }
    }

    async fn record_sale(
        &mut self,
        raffle_id: RaffleId,
        quantity: u32,
    ) -> Result<Raffle, StoreError> {
        let quantity = i32::try_from(quantity)
            .map_err(|e| StoreError::Decode(format!("quantity overflow: {e}")))?;

        // Atomic in-place increment; the same statement ends the raffle when
        // this sale exhausts the pool, so closure lands in the same commit.
        let row = sqlx::query(
            r"
            UPDATE raffles
            SET tickets_sold = tickets_sold + $2,
                status = CASE
                    WHEN tickets_sold + $2 >= total_tickets THEN 'ended'
                    ELSE status
                END,
                updated_at = now()
            WHERE id = $1
            RETURNING id, title, description, ticket_price, total_tickets, tickets_sold,
                      min_tickets_per_purchase, status, winner, winner_image_url,
                      prize_image_url, ends_at, created_at, updated_at
            ",
        )
        .bind(raffle_id.as_uuid())
        .bind(quantity)
        .fetch_optional(&mut **self.tx)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rows::row_to_raffle).transpose()?.ok_or_else(|| {
            StoreError::Database(format!("raffle {raffle_id} vanished mid-commit"))
        })
    }
}
