//! Schema bootstrap for the raffle tables.
//!
//! The DDL lives here as idempotent statements so embedders and tests share
//! one schema source without requiring a `DATABASE_URL` at compile time.
//!
//! Two constraints carry the platform's correctness burden:
//!
//! - the composite primary key on `tickets (raffle_id, number)` — the last
//!   line of defense against two buyers receiving the same number
//! - the unique index on `purchases.transaction_id` — one payment proof can
//!   back at most one purchase
//!
//! Foreign keys are `ON DELETE RESTRICT`: a raffle outlives every ticket and
//! purchase that references it.

use rifa_core::StoreError;
use sqlx::PgPool;

/// Create the raffle tables and indexes if they do not exist.
///
/// Safe to call on every startup.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if any statement fails.
pub async fn initialize_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS raffles (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            ticket_price BIGINT NOT NULL,
            total_tickets INTEGER NOT NULL CHECK (total_tickets > 0),
            tickets_sold INTEGER NOT NULL DEFAULT 0
                CHECK (tickets_sold >= 0 AND tickets_sold <= total_tickets),
            min_tickets_per_purchase INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'active',
            winner TEXT,
            winner_image_url TEXT,
            prize_image_url TEXT,
            ends_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS tickets (
            raffle_id UUID NOT NULL REFERENCES raffles(id) ON DELETE RESTRICT,
            number TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (raffle_id, number)
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS purchases (
            id UUID PRIMARY KEY,
            raffle_id UUID NOT NULL REFERENCES raffles(id) ON DELETE RESTRICT,
            buyer_name TEXT NOT NULL,
            buyer_phone TEXT NOT NULL,
            amount BIGINT NOT NULL,
            ticket_count INTEGER NOT NULL CHECK (ticket_count > 0),
            payment_method TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            transaction_id TEXT NOT NULL UNIQUE,
            ticket_numbers TEXT[] NOT NULL,
            receipt_url TEXT NOT NULL,
            receipt_storage_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raffles_status ON raffles(status)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchases_raffle ON purchases(raffle_id)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchases_status ON purchases(status)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    tracing::debug!("raffle schema initialized");

    Ok(())
}
