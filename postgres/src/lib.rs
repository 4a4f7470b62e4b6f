//! `PostgreSQL` storage backend for the workshop ledger.
//!
//! [`PostgresLedgerStore`] implements every storage trait from
//! `workshop-ledger-core` on top of a sqlx connection pool:
//!
//! - Counter increments are a single `INSERT .. ON CONFLICT DO UPDATE .. RETURNING`
//! - Seat claims are a single conditional `UPDATE .. WHERE status = 'active'
//!   AND current_registrations < max_seats`, which flips the status in the
//!   same statement
//! - Reconciliation locks the workshop row (`FOR UPDATE`) while counting
//!
//! The pool is created explicitly with [`PostgresLedgerStore::connect`] and
//! closed with [`PostgresLedgerStore::close`].
//!
//! # Example
//!
//! ```ignore
//! use workshop_ledger_postgres::{PostgresConfig, PostgresLedgerStore};
//!
//! let config = PostgresConfig::new("postgres://localhost/ledger");
//! let store = PostgresLedgerStore::connect(&config).await?;
//! // ... serve requests ...
//! store.close().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod rows;
mod store;

pub use config::PostgresConfig;
pub use store::PostgresLedgerStore;
