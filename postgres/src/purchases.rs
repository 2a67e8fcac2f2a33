//! Purchase administration store.
//!
//! Read and verification operations for the back office: listing purchases,
//! moving them through payment verification, and the dashboard summary.
//! Creation goes through the transactional commit path, never through this
//! store.

use crate::rows::{self, db_error};
use rifa_core::{Money, Purchase, PurchaseId, PurchaseStatus, RaffleId, StoreError};
use sqlx::PgPool;

/// Aggregate numbers for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesSummary {
    /// Total raffles ever created
    pub total_raffles: u64,
    /// Tickets across verified purchases
    pub verified_tickets: u64,
    /// Revenue across verified purchases
    pub verified_revenue: Money,
}

/// `PostgreSQL`-backed purchase store.
pub struct PostgresPurchaseStore {
    pool: PgPool,
}

impl PostgresPurchaseStore {
    /// Create a store over the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch a purchase by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or the row is corrupt.
    pub async fn find(&self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, raffle_id, buyer_name, buyer_phone, amount, ticket_count,
                   payment_method, status, transaction_id, ticket_numbers,
                   receipt_url, receipt_storage_id, created_at, updated_at
            FROM purchases
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rows::row_to_purchase).transpose()
    }

    /// List all purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row is corrupt.
    pub async fn list(&self) -> Result<Vec<Purchase>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, raffle_id, buyer_name, buyer_phone, amount, ticket_count,
                   payment_method, status, transaction_id, ticket_numbers,
                   receipt_url, receipt_storage_id, created_at, updated_at
            FROM purchases
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(rows::row_to_purchase).collect()
    }

    /// List the purchases of one raffle, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row is corrupt.
    pub async fn list_for_raffle(&self, raffle_id: RaffleId) -> Result<Vec<Purchase>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, raffle_id, buyer_name, buyer_phone, amount, ticket_count,
                   payment_method, status, transaction_id, ticket_numbers,
                   receipt_url, receipt_storage_id, created_at, updated_at
            FROM purchases
            WHERE raffle_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(raffle_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(rows::row_to_purchase).collect()
    }

    /// Move a purchase to a new verification status and return the new
    /// state, or `None` if the purchase does not exist.
    ///
    /// Rejecting a purchase does NOT return its ticket numbers to the pool:
    /// the ticket rows stay in place so a disputed payment can never race a
    /// resale of the same number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn set_status(
        &self,
        id: PurchaseId,
        status: PurchaseStatus,
    ) -> Result<Option<Purchase>, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE purchases
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, raffle_id, buyer_name, buyer_phone, amount, ticket_count,
                      payment_method, status, transaction_id, ticket_numbers,
                      receipt_url, receipt_storage_id, created_at, updated_at
            ",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        if row.is_some() {
            tracing::info!(purchase_id = %id, status = status.as_str(), "purchase status updated");
        }

        row.as_ref().map(rows::row_to_purchase).transpose()
    }

    /// Dashboard summary: raffle count plus verified ticket and revenue
    /// totals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn summary(&self) -> Result<SalesSummary, StoreError> {
        let (total_raffles, verified_tickets, verified_revenue): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM raffles),
                COALESCE(SUM(ticket_count) FILTER (WHERE status = 'verified'), 0)::BIGINT,
                COALESCE(SUM(amount) FILTER (WHERE status = 'verified'), 0)::BIGINT
            FROM purchases
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(SalesSummary {
            total_raffles: u64::try_from(total_raffles)
                .map_err(|e| StoreError::Decode(format!("raffle count overflow: {e}")))?,
            verified_tickets: u64::try_from(verified_tickets)
                .map_err(|e| StoreError::Decode(format!("ticket total overflow: {e}")))?,
            verified_revenue: u64::try_from(verified_revenue)
                .map(Money::from_cents)
                .map_err(|e| StoreError::Decode(format!("revenue overflow: {e}")))?,
        })
    }
}
