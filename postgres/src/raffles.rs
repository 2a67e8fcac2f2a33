//! Raffle administration store.
//!
//! Plain CRUD for the back office: creating and editing raffles, the public
//! listing sweep, winner assignment. None of this runs inside the purchase
//! commit path; the only shared invariant is that a raffle can never be
//! deleted while tickets or purchases still reference it.

use crate::rows::{self, db_error};
use chrono::{DateTime, Utc};
use rifa_core::{Money, Raffle, RaffleId, RaffleStatus, StoreError};
use sqlx::PgPool;

/// Partial update for a raffle; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct RaffleChanges {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New ticket price
    pub ticket_price: Option<Money>,
    /// New pool size; rejected by the store if below the sold count
    pub total_tickets: Option<u32>,
    /// New storefront minimum
    pub min_tickets_per_purchase: Option<u32>,
    /// New end date
    pub ends_at: Option<DateTime<Utc>>,
    /// New lifecycle status
    pub status: Option<RaffleStatus>,
    /// New prize image URL
    pub prize_image_url: Option<String>,
}

/// `PostgreSQL`-backed raffle store.
pub struct PostgresRaffleStore {
    pool: PgPool,
}

impl PostgresRaffleStore {
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

    /// Persist a freshly created raffle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn create(&self, raffle: &Raffle) -> Result<(), StoreError> {
        let ticket_price = i64::try_from(raffle.ticket_price.cents())
            .map_err(|e| StoreError::Decode(format!("ticket price overflow: {e}")))?;
        let total_tickets = i32::try_from(raffle.total_tickets)
            .map_err(|e| StoreError::Decode(format!("total tickets overflow: {e}")))?;
        let tickets_sold = i32::try_from(raffle.tickets_sold)
            .map_err(|e| StoreError::Decode(format!("tickets sold overflow: {e}")))?;
        let min_tickets = i32::try_from(raffle.min_tickets_per_purchase)
            .map_err(|e| StoreError::Decode(format!("minimum tickets overflow: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO raffles (
                id, title, description, ticket_price, total_tickets, tickets_sold,
                min_tickets_per_purchase, status, winner, winner_image_url,
                prize_image_url, ends_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(raffle.id.as_uuid())
        .bind(&raffle.title)
        .bind(&raffle.description)
        .bind(ticket_price)
        .bind(total_tickets)
        .bind(tickets_sold)
        .bind(min_tickets)
        .bind(raffle.status.as_str())
        .bind(&raffle.winner)
        .bind(&raffle.winner_image_url)
        .bind(&raffle.prize_image_url)
        .bind(raffle.ends_at)
        .bind(raffle.created_at)
        .bind(raffle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::info!(
            raffle_id = %raffle.id,
            total_tickets = raffle.total_tickets,
            "raffle created"
        );

        Ok(())
    }

    /// Fetch a raffle by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or the row is corrupt.
    pub async fn find(&self, id: RaffleId) -> Result<Option<Raffle>, StoreError> {
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
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rows::row_to_raffle).transpose()
    }

    /// List all raffles, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row is corrupt.
    pub async fn list(&self) -> Result<Vec<Raffle>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, ticket_price, total_tickets, tickets_sold,
                   min_tickets_per_purchase, status, winner, winner_image_url,
                   prize_image_url, ends_at, created_at, updated_at
            FROM raffles
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(rows::row_to_raffle).collect()
    }

    /// List the raffles the storefront should show (active and paused),
    /// newest first, after sweeping overdue ones to `ended`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the sweep or query fails.
    pub async fn list_open(&self) -> Result<Vec<Raffle>, StoreError> {
        self.expire_overdue().await?;

        let rows = sqlx::query(
            r"
            SELECT id, title, description, ticket_price, total_tickets, tickets_sold,
                   min_tickets_per_purchase, status, winner, winner_image_url,
                   prize_image_url, ends_at, created_at, updated_at
            FROM raffles
            WHERE status IN ('active', 'paused')
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(rows::row_to_raffle).collect()
    }

    /// End every active raffle whose end date has passed.
    ///
    /// Returns how many raffles were swept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    pub async fn expire_overdue(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE raffles
            SET status = 'ended', updated_at = now()
            WHERE status = 'active' AND ends_at <= now()
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let swept = result.rows_affected();
        if swept > 0 {
            tracing::info!(swept, "overdue raffles ended");
        }

        Ok(swept)
    }

    /// Apply a partial update to a raffle and return the new state, or
    /// `None` if the raffle does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails — including a
    /// `total_tickets` change that would fall below the sold count, which
    /// the schema's check constraint rejects.
    pub async fn update(
        &self,
        id: RaffleId,
        changes: &RaffleChanges,
    ) -> Result<Option<Raffle>, StoreError> {
        let ticket_price = changes
            .ticket_price
            .map(|price| {
                i64::try_from(price.cents())
                    .map_err(|e| StoreError::Decode(format!("ticket price overflow: {e}")))
            })
            .transpose()?;
        let total_tickets = changes
            .total_tickets
            .map(|total| {
                i32::try_from(total)
                    .map_err(|e| StoreError::Decode(format!("total tickets overflow: {e}")))
            })
            .transpose()?;
        let min_tickets = changes
            .min_tickets_per_purchase
            .map(|min| {
                i32::try_from(min)
                    .map_err(|e| StoreError::Decode(format!("minimum tickets overflow: {e}")))
            })
            .transpose()?;

        let row = sqlx::query(
            r"
            UPDATE raffles
            SET title = COALESCE($2::TEXT, title),
                description = COALESCE($3::TEXT, description),
                ticket_price = COALESCE($4::BIGINT, ticket_price),
                total_tickets = COALESCE($5::INTEGER, total_tickets),
                min_tickets_per_purchase = COALESCE($6::INTEGER, min_tickets_per_purchase),
                ends_at = COALESCE($7::TIMESTAMPTZ, ends_at),
                status = COALESCE($8::TEXT, status),
                prize_image_url = COALESCE($9::TEXT, prize_image_url),
                updated_at = now()
            WHERE id = $1
            RETURNING id, title, description, ticket_price, total_tickets, tickets_sold,
                      min_tickets_per_purchase, status, winner, winner_image_url,
                      prize_image_url, ends_at, created_at, updated_at
            ",
        )
        .bind(id.as_uuid())
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(ticket_price)
        .bind(total_tickets)
        .bind(min_tickets)
        .bind(changes.ends_at)
        .bind(changes.status.map(|status| status.as_str()))
        .bind(&changes.prize_image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rows::row_to_raffle).transpose()
    }

    /// Record the winner of a finished raffle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn assign_winner(
        &self,
        id: RaffleId,
        winner: &str,
        winner_image_url: Option<&str>,
    ) -> Result<Option<Raffle>, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE raffles
            SET winner = $2,
                winner_image_url = COALESCE($3::TEXT, winner_image_url),
                updated_at = now()
            WHERE id = $1
            RETURNING id, title, description, ticket_price, total_tickets, tickets_sold,
                      min_tickets_per_purchase, status, winner, winner_image_url,
                      prize_image_url, ends_at, created_at, updated_at
            ",
        )
        .bind(id.as_uuid())
        .bind(winner)
        .bind(winner_image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        if row.is_some() {
            tracing::info!(raffle_id = %id, winner, "winner assigned");
        }

        row.as_ref().map(rows::row_to_raffle).transpose()
    }

    /// Delete a raffle, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InUse`] while tickets or purchases still
    /// reference the raffle, [`StoreError::Database`] on other failures.
    pub async fn delete(&self, id: RaffleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM raffles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                StoreError::InUse("raffle still has tickets or purchases".to_string()),
            ),
            Err(e) => Err(db_error(e)),
        }
    }
}
