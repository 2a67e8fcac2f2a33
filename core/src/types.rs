//! Domain types for the raffle platform.
//!
//! This module contains the value objects and entities shared by the
//! allocator, the commit coordinator and the storage backends: identifiers,
//! money, ticket numbers, lifecycle statuses and the `Raffle`/`Purchase`
//! entities themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaffleId(Uuid);

impl RaffleId {
    /// Creates a new random `RaffleId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RaffleId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RaffleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RaffleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(Uuid);

impl PurchaseId {
    /// Creates a new random `PurchaseId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PurchaseId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Saturating addition
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Ticket numbers
// ============================================================================

/// A reserved ticket number within a raffle's pool.
///
/// Numbers are drawn from the dense range `[0, capacity)` and stored as
/// strings zero-padded to the width of the largest number in the pool, so a
/// raffle with 60 tickets uses "00".."59" and one with 1000 tickets uses
/// "0000".."0999".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketNumber(String);

impl TicketNumber {
    /// Format a raw draw as a zero-padded number string.
    #[must_use]
    pub fn format(raw: u32, width: usize) -> Self {
        Self(format!("{raw:0width$}"))
    }

    /// Wrap an already-formatted number string (e.g. loaded from storage).
    #[must_use]
    pub const fn from_string(number: String) -> Self {
        Self(number)
    }

    /// The padded number string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The padded width of the string, in digits.
    ///
    /// Width is derived from the largest number in the pool (`capacity - 1`):
    /// capacity 60 gives width 2, capacity 1000 gives width 4. A capacity of
    /// 1 still uses a single digit ("0").
    #[must_use]
    pub const fn width_for(capacity: u32) -> usize {
        match capacity.saturating_sub(1).checked_ilog10() {
            Some(digits) => (digits + 1) as usize,
            None => 1,
        }
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TicketNumber> for String {
    fn from(number: TicketNumber) -> Self {
        number.0
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Error returned when a domain value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {value}")]
pub struct InvalidValue {
    /// Name of the rejected field.
    pub field: &'static str,
    /// The offending value.
    pub value: String,
}

impl InvalidValue {
    /// Create a new `InvalidValue` for the named field.
    #[must_use]
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Lifecycle status of a raffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleStatus {
    /// Open for purchases and publicly listed
    Active,
    /// Hidden from the storefront but not finished
    Paused,
    /// Finished; no further purchases are accepted
    Ended,
}

impl RaffleStatus {
    /// Convert status to its storage string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }

    /// Parse status from its storage string representation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, InvalidValue> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "ended" => Ok(Self::Ended),
            _ => Err(InvalidValue::new("raffle status", s)),
        }
    }
}

/// Verification status of a purchase.
///
/// Every purchase starts `Pending`; an administrator later verifies the
/// payment proof and moves it to `Verified` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseStatus {
    /// Awaiting payment verification
    Pending,
    /// Payment proof accepted
    Verified,
    /// Payment proof rejected
    Rejected,
}

impl PurchaseStatus {
    /// Convert status to its storage string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    /// Parse status from its storage string representation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, InvalidValue> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(InvalidValue::new("purchase status", s)),
        }
    }
}

/// How the buyer claims to have paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Card payment
    Card,
    /// Bank transfer
    Transfer,
    /// Cash handed over in person
    Cash,
}

impl PaymentMethod {
    /// Convert method to its storage string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Cash => "cash",
        }
    }

    /// Parse method from its storage string representation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] if the string doesn't match a known method.
    pub fn parse(s: &str) -> Result<Self, InvalidValue> {
        match s {
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            "cash" => Ok(Self::Cash),
            _ => Err(InvalidValue::new("payment method", s)),
        }
    }
}

// ============================================================================
// Raffle
// ============================================================================

/// Input for creating a raffle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRaffle {
    /// Display title
    pub title: String,
    /// Optional long description
    pub description: Option<String>,
    /// Price of a single ticket
    pub ticket_price: Money,
    /// Fixed pool size; positive, immutable after creation
    pub total_tickets: u32,
    /// Storefront minimum per purchase (not enforced by the commit path)
    pub min_tickets_per_purchase: u32,
    /// Stable URL of the prize image on the external media host
    pub prize_image_url: Option<String>,
    /// When the raffle ends
    pub ends_at: DateTime<Utc>,
}

/// A single prize drawing with a fixed ticket pool and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raffle {
    /// Unique identifier
    pub id: RaffleId,
    /// Display title
    pub title: String,
    /// Optional long description
    pub description: Option<String>,
    /// Price of a single ticket
    pub ticket_price: Money,
    /// Fixed pool size
    pub total_tickets: u32,
    /// Tickets sold so far; `sold <= total_tickets` always holds
    pub tickets_sold: u32,
    /// Storefront minimum per purchase
    pub min_tickets_per_purchase: u32,
    /// Lifecycle status
    pub status: RaffleStatus,
    /// Winner's name, once assigned
    pub winner: Option<String>,
    /// Photo of the winner, once assigned
    pub winner_image_url: Option<String>,
    /// Stable URL of the prize image
    pub prize_image_url: Option<String>,
    /// When the raffle ends
    pub ends_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Raffle {
    /// Create a fresh raffle from its creation input.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue`] if `total_tickets` is zero — the pool must
    /// contain at least one number.
    pub fn new(input: NewRaffle) -> Result<Self, InvalidValue> {
        if input.total_tickets == 0 {
            return Err(InvalidValue::new("total_tickets", "0"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RaffleId::new(),
            title: input.title,
            description: input.description,
            ticket_price: input.ticket_price,
            total_tickets: input.total_tickets,
            tickets_sold: 0,
            min_tickets_per_purchase: input.min_tickets_per_purchase,
            status: RaffleStatus::Active,
            winner: None,
            winner_image_url: None,
            prize_image_url: input.prize_image_url,
            ends_at: input.ends_at,
            created_at: now,
            updated_at: now,
        })
    }

    /// How many tickets remain unsold.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.total_tickets.saturating_sub(self.tickets_sold)
    }

    /// Padded width of this raffle's ticket numbers.
    #[must_use]
    pub const fn number_width(&self) -> usize {
        TicketNumber::width_for(self.total_tickets)
    }

    /// Whether the raffle still accepts purchases.
    ///
    /// Paused raffles are hidden from the storefront but an in-flight
    /// purchase against one is still honored; only `Ended` blocks commits.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.status, RaffleStatus::Ended)
    }

    /// Record a completed sale of `quantity` tickets.
    ///
    /// Increments the sold counter and ends the raffle in the same step when
    /// the pool is exhausted, so the purchase that sells the last ticket also
    /// closes the raffle.
    pub fn register_sale(&mut self, quantity: u32) {
        self.tickets_sold = self.tickets_sold.saturating_add(quantity);
        if self.tickets_sold >= self.total_tickets {
            self.status = RaffleStatus::Ended;
        }
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Purchase
// ============================================================================

/// Reference to an externally-stored payment proof.
///
/// The proof is uploaded to the media host *before* the purchase commit is
/// invoked; the core only records the returned reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Stable public URL of the stored artifact
    pub url: String,
    /// Storage-side identifier of the artifact
    pub storage_id: String,
}

/// Input for committing a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseInput {
    /// Buyer's full name
    pub buyer_name: String,
    /// Buyer's phone number
    pub buyer_phone: String,
    /// The raffle being entered
    pub raffle_id: RaffleId,
    /// Amount the buyer claims to have paid
    pub amount: Money,
    /// How many tickets to reserve
    pub ticket_count: u32,
    /// How the buyer paid
    pub payment_method: PaymentMethod,
    /// Externally-supplied payment reference; unique across all purchases
    pub transaction_id: String,
    /// Reference to the uploaded payment proof
    pub receipt: PaymentProof,
}

/// A buyer's transaction record, embedding the ticket numbers it was granted.
///
/// The embedded `ticket_numbers` list is a read-optimized copy written once
/// at commit time; the ticket rows remain the sole source of truth for
/// uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique identifier
    pub id: PurchaseId,
    /// The raffle this purchase belongs to
    pub raffle_id: RaffleId,
    /// Buyer's full name
    pub buyer_name: String,
    /// Buyer's phone number
    pub buyer_phone: String,
    /// Amount paid
    pub amount: Money,
    /// Number of tickets granted; equals `ticket_numbers.len()`
    pub ticket_count: u32,
    /// How the buyer paid
    pub payment_method: PaymentMethod,
    /// Verification status
    pub status: PurchaseStatus,
    /// Externally-supplied payment reference
    pub transaction_id: String,
    /// The granted ticket numbers
    pub ticket_numbers: Vec<TicketNumber>,
    /// Reference to the uploaded payment proof
    pub receipt: PaymentProof,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// Build a pending purchase from its input and the reserved numbers.
    #[must_use]
    pub fn from_input(input: PurchaseInput, ticket_numbers: Vec<TicketNumber>) -> Self {
        debug_assert_eq!(ticket_numbers.len(), input.ticket_count as usize);
        let now = Utc::now();
        Self {
            id: PurchaseId::new(),
            raffle_id: input.raffle_id,
            buyer_name: input.buyer_name,
            buyer_phone: input.buyer_phone,
            amount: input.amount,
            ticket_count: input.ticket_count,
            payment_method: input.payment_method,
            status: PurchaseStatus::Pending,
            transaction_id: input.transaction_id,
            ticket_numbers,
            receipt: input.receipt,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_raffle(total_tickets: u32) -> Raffle {
        Raffle::new(NewRaffle {
            title: "Motorbike".to_string(),
            description: None,
            ticket_price: Money::from_cents(500),
            total_tickets,
            min_tickets_per_purchase: 1,
            prize_image_url: None,
            ends_at: Utc::now() + chrono::Duration::days(30),
        })
        .expect("valid raffle input")
    }

    #[test]
    fn width_matches_pool_size() {
        assert_eq!(TicketNumber::width_for(1), 1);
        assert_eq!(TicketNumber::width_for(10), 1);
        assert_eq!(TicketNumber::width_for(11), 2);
        assert_eq!(TicketNumber::width_for(60), 2);
        assert_eq!(TicketNumber::width_for(100), 2);
        assert_eq!(TicketNumber::width_for(101), 3);
        assert_eq!(TicketNumber::width_for(1000), 4);
    }

    #[test]
    fn number_formatting_pads_with_zeros() {
        assert_eq!(TicketNumber::format(7, 1).as_str(), "7");
        assert_eq!(TicketNumber::format(7, 2).as_str(), "07");
        assert_eq!(TicketNumber::format(7, 4).as_str(), "0007");
        assert_eq!(TicketNumber::format(999, 4).as_str(), "0999");
    }

    #[test]
    fn status_roundtrip() {
        for status in &[RaffleStatus::Active, RaffleStatus::Paused, RaffleStatus::Ended] {
            let parsed = RaffleStatus::parse(status.as_str()).expect("valid status should parse");
            assert_eq!(*status, parsed);
        }
        for status in &[
            PurchaseStatus::Pending,
            PurchaseStatus::Verified,
            PurchaseStatus::Rejected,
        ] {
            let parsed = PurchaseStatus::parse(status.as_str()).expect("valid status should parse");
            assert_eq!(*status, parsed);
        }
        assert!(RaffleStatus::parse("closed").is_err());
        assert!(PurchaseStatus::parse("completed").is_err());
        assert!(PaymentMethod::parse("crypto").is_err());
    }

    #[test]
    fn raffle_rejects_empty_pool() {
        let result = Raffle::new(NewRaffle {
            title: "Empty".to_string(),
            description: None,
            ticket_price: Money::from_cents(100),
            total_tickets: 0,
            min_tickets_per_purchase: 1,
            prize_image_url: None,
            ends_at: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn register_sale_ends_raffle_on_exhaustion() {
        let mut raffle = sample_raffle(10);
        raffle.register_sale(4);
        assert_eq!(raffle.tickets_sold, 4);
        assert_eq!(raffle.remaining(), 6);
        assert_eq!(raffle.status, RaffleStatus::Active);

        raffle.register_sale(6);
        assert_eq!(raffle.tickets_sold, 10);
        assert_eq!(raffle.remaining(), 0);
        assert_eq!(raffle.status, RaffleStatus::Ended);
        assert!(!raffle.is_open());
    }

    #[test]
    fn paused_raffle_still_accepts_commits() {
        let mut raffle = sample_raffle(10);
        raffle.status = RaffleStatus::Paused;
        assert!(raffle.is_open());
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(12_345).to_string(), "123.45");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(
            Money::checked_from_units(20),
            Some(Money::from_cents(2000))
        );
    }

    proptest! {
        // Every number in the pool formats to exactly the derived width and
        // parses back to the raw value it came from.
        #[test]
        fn formatted_numbers_have_uniform_width(capacity in 1u32..1_000_000, raw in 0u32..1_000_000) {
            prop_assume!(raw < capacity);
            let width = TicketNumber::width_for(capacity);
            let number = TicketNumber::format(raw, width);
            prop_assert_eq!(number.as_str().len(), width);
            prop_assert_eq!(number.as_str().parse::<u32>().unwrap(), raw);
        }
    }
}
