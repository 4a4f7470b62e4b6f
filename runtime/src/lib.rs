//! # Workshop Ledger Runtime
//!
//! Runtime support for running the ledger in a process.
//!
//! ## Core Components
//!
//! - **[`LedgerRuntime`]**: wires the ledger services around one store and
//!   runs operator operations with retry on transient storage failures
//! - **[`retry`]**: exponential backoff for `TransientStorage` errors
//! - **[`metrics`]**: metric descriptions and the Prometheus exporter
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use workshop_ledger_runtime::{LedgerRuntime, retry::RetryPolicy};
//!
//! let runtime = LedgerRuntime::new(Arc::new(store), RetryPolicy::default());
//! for report in runtime.reconcile_all().await? {
//!     println!("{}: {} -> {}", report.title, report.before, report.after);
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;
use workshop_ledger_core::capacity::CapacityTracker;
use workshop_ledger_core::catalog::WorkshopCatalog;
use workshop_ledger_core::environment::{Clock, SystemClock};
use workshop_ledger_core::error::Result;
use workshop_ledger_core::ledger::RegistrationLedger;
use workshop_ledger_core::store::LedgerStore;
use workshop_ledger_core::types::{ReconcileReport, Workshop, WorkshopId};

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

use crate::metrics::ReconcileMetrics;
use crate::retry::{RetryPolicy, retry_transient};

/// The ledger services for one store, plus the retry policy operators run under.
pub struct LedgerRuntime<S> {
    catalog: WorkshopCatalog<S>,
    ledger: RegistrationLedger<S>,
    retry: RetryPolicy,
}

impl<S: LedgerStore> LedgerRuntime<S> {
    /// Wire the services over `store` using wall-clock time.
    #[must_use]
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), retry)
    }

    /// Wire the services with an explicit clock.
    #[must_use]
    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            catalog: WorkshopCatalog::new(Arc::clone(&store), Arc::clone(&clock)),
            ledger: RegistrationLedger::new(store, clock),
            retry,
        }
    }

    /// Administrative workshop operations.
    #[must_use]
    pub const fn catalog(&self) -> &WorkshopCatalog<S> {
        &self.catalog
    }

    /// Registration submission and deletion.
    #[must_use]
    pub const fn ledger(&self) -> &RegistrationLedger<S> {
        &self.ledger
    }

    /// Seat tracking and reconciliation.
    #[must_use]
    pub const fn capacity(&self) -> &CapacityTracker<S> {
        self.ledger.capacity()
    }

    /// Every workshop, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the storage error once retries are spent.
    pub async fn workshops(&self) -> Result<Vec<Workshop>> {
        retry_transient(&self.retry, "list_workshops", || self.catalog.list()).await
    }

    /// Reconcile one workshop, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop, or the storage
    /// error once retries are spent.
    pub async fn reconcile(&self, workshop_id: WorkshopId) -> Result<ReconcileReport> {
        retry_transient(&self.retry, "reconcile", || {
            self.capacity().reconcile(workshop_id)
        })
        .await
    }

    /// Reconcile every workshop, retrying each one independently.
    ///
    /// # Errors
    ///
    /// Stops at the first workshop whose retries are spent.
    pub async fn reconcile_all(&self) -> Result<Vec<ReconcileReport>> {
        let started = Instant::now();
        let workshops = self.workshops().await?;
        let mut reports = Vec::with_capacity(workshops.len());
        for workshop in &workshops {
            reports.push(self.reconcile(workshop.id).await?);
        }
        ReconcileMetrics::record_pass(started.elapsed());

        let corrected = reports.iter().filter(|r| r.drifted()).count();
        tracing::info!(workshops = reports.len(), corrected, "Reconciliation pass finished");
        Ok(reports)
    }
}
