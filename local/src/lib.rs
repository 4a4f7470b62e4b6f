//! JSON file storage backend for the workshop ledger.
//!
//! [`JsonFileLedgerStore`] keeps the whole ledger (counters, workshops,
//! registrations) in a single `ledger.json` inside a data directory. It is
//! meant for single-node deployments and local development where running
//! `PostgreSQL` is not worth it. Writes go through a temp file and a rename so
//! the document on disk is always complete.
//!
//! # Example
//!
//! ```ignore
//! use workshop_ledger_local::JsonFileLedgerStore;
//!
//! let store = JsonFileLedgerStore::open("./data").await?;
//! // ... serve requests ...
//! store.close().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod file;
mod store;

pub use file::LEDGER_FILENAME;
pub use store::JsonFileLedgerStore;
