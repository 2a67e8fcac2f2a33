//! `PostgreSQL` storage layer for the Rifa raffle platform.
//!
//! This crate provides the production implementations of the storage seams
//! defined in `rifa-core`. It uses sqlx with runtime-checked queries and
//! supports:
//!
//! - Transactional purchase commits — tickets, purchase record and sold
//!   counter become visible together or not at all
//! - Unique-constraint arbitration of concurrent ticket-number claims
//! - Raffle and purchase administration for the back office
//! - Connection pooling configured from the environment
//!
//! # Example
//!
//! ```ignore
//! use rifa_postgres::{PostgresConfig, PurchaseCommitter, initialize_schema};
//!
//! async fn example(input: rifa_core::PurchaseInput) -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::from_env().connect().await?;
//!     initialize_schema(&pool).await?;
//!
//!     let committer = PurchaseCommitter::new(pool);
//!     let purchase = committer.commit(input).await?;
//!     println!("granted numbers: {:?}", purchase.ticket_numbers);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commit;
pub mod config;
pub mod purchases;
pub mod raffles;
mod rows;
pub mod schema;

pub use commit::{PgUnitOfWork, PurchaseCommitter};
pub use config::PostgresConfig;
pub use purchases::{PostgresPurchaseStore, SalesSummary};
pub use raffles::{PostgresRaffleStore, RaffleChanges};
pub use schema::initialize_schema;
