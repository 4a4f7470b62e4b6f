//! Recount registrations and repair drifted seat counters.
//!
//! # Usage
//!
//! ```bash
//! # Every workshop
//! ledger-reconcile
//!
//! # One workshop
//! ledger-reconcile 6f1c2a9e-4b7d-4f8e-9a51-0c3d2e1f4a5b
//! ```
//!
//! Prints `title: before -> after` for each corrected workshop and
//! `title: already correct at N` for the rest.

use anyhow::Context;
use workshop_ledger_cli::{Config, Reconcile, execute, init_tracing};
use workshop_ledger_core::types::WorkshopId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let workshop_id = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<WorkshopId>())
        .transpose()
        .context("usage: ledger-reconcile [WORKSHOP_ID]")?;

    let config = Config::from_env()?;
    for line in execute(&config, Reconcile { workshop_id }).await? {
        println!("{line}");
    }
    Ok(())
}
