//! Row-to-domain mapping shared by the store modules.

use rifa_core::{
    Money, PaymentMethod, PaymentProof, Purchase, PurchaseId, PurchaseStatus, Raffle, RaffleId,
    RaffleStatus, StoreError, TicketNumber,
};
use sqlx::Row;
use sqlx::postgres::PgRow;

pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn to_money(cents: i64, field: &str) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|e| StoreError::Decode(format!("negative {field}: {e}")))
}

fn to_count(value: i32, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| StoreError::Decode(format!("negative {field}: {e}")))
}

/// Map a `raffles` row onto the domain entity.
pub(crate) fn row_to_raffle(row: &PgRow) -> Result<Raffle, StoreError> {
    let status_str: String = row.get("status");
    let status = RaffleStatus::parse(&status_str).map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(Raffle {
        id: RaffleId::from_uuid(row.get("id")),
        title: row.get("title"),
        description: row.get("description"),
        ticket_price: to_money(row.get("ticket_price"), "ticket_price")?,
        total_tickets: to_count(row.get("total_tickets"), "total_tickets")?,
        tickets_sold: to_count(row.get("tickets_sold"), "tickets_sold")?,
        min_tickets_per_purchase: to_count(
            row.get("min_tickets_per_purchase"),
            "min_tickets_per_purchase",
        )?,
        status,
        winner: row.get("winner"),
        winner_image_url: row.get("winner_image_url"),
        prize_image_url: row.get("prize_image_url"),
        ends_at: row.get("ends_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a `purchases` row onto the domain entity.
pub(crate) fn row_to_purchase(row: &PgRow) -> Result<Purchase, StoreError> {
    let status_str: String = row.get("status");
    let status =
        PurchaseStatus::parse(&status_str).map_err(|e| StoreError::Decode(e.to_string()))?;
    let method_str: String = row.get("payment_method");
    let payment_method =
        PaymentMethod::parse(&method_str).map_err(|e| StoreError::Decode(e.to_string()))?;
    let numbers: Vec<String> = row.get("ticket_numbers");

    Ok(Purchase {
        id: PurchaseId::from_uuid(row.get("id")),
        raffle_id: RaffleId::from_uuid(row.get("raffle_id")),
        buyer_name: row.get("buyer_name"),
        buyer_phone: row.get("buyer_phone"),
        amount: to_money(row.get("amount"), "amount")?,
        ticket_count: to_count(row.get("ticket_count"), "ticket_count")?,
        payment_method,
        status,
        transaction_id: row.get("transaction_id"),
        ticket_numbers: numbers.into_iter().map(TicketNumber::from_string).collect(),
        receipt: PaymentProof {
            url: row.get("receipt_url"),
            storage_id: row.get("receipt_storage_id"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
