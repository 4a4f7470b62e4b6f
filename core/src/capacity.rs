//! Seat capacity tracking.
//!
//! The tracker is the only writer of `current_registrations` and of the
//! occupancy-driven `active ⇄ full` status transitions. Administrative
//! statuses (`draft`, `upcoming`, `completed`, `cancelled`) are never touched.

use crate::environment::Clock;
use crate::error::{LedgerError, Result};
use crate::store::LedgerStore;
use crate::types::{ReconcileReport, Workshop, WorkshopId, WorkshopStatus};
use std::sync::Arc;

/// Keeps each workshop's seat counter and status in step with its registrations.
pub struct CapacityTracker<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for CapacityTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LedgerStore> CapacityTracker<S> {
    /// Create a tracker over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Whether the workshop may take another registration right now.
    ///
    /// This is advisory; [`claim_seat`](Self::claim_seat) is the check that
    /// holds under concurrency.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    pub async fn can_accept_registration(&self, workshop_id: WorkshopId) -> Result<bool> {
        Ok(self.load(workshop_id).await?.can_accept_registration())
    }

    /// Atomically take a seat if the workshop is active and not full.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when no seat could be taken and
    /// `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn claim_seat(&self, workshop_id: WorkshopId) -> Result<Workshop> {
        match self.store.claim_seat(workshop_id, self.clock.now()).await {
            Ok(workshop) => {
                metrics::counter!("ledger.seats.claimed").increment(1);
                tracing::debug!(
                    %workshop_id,
                    current = workshop.current_registrations,
                    max = workshop.max_seats,
                    "Seat claimed"
                );
                log_if_full(&workshop);
                Ok(workshop)
            }
            Err(e @ LedgerError::CapacityExceeded { .. }) => {
                metrics::counter!("ledger.capacity.rejected").increment(1);
                tracing::info!(%workshop_id, error = %e, "Seat claim rejected");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Count a registration that was created without a prior claim.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn on_registration_created(&self, workshop_id: WorkshopId) -> Result<Workshop> {
        let workshop = self.store.record_seat(workshop_id, self.clock.now()).await?;
        metrics::counter!("ledger.seats.claimed").increment(1);
        log_if_full(&workshop);
        Ok(workshop)
    }

    /// Give back the seat of a deleted registration.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn on_registration_deleted(&self, workshop_id: WorkshopId) -> Result<Workshop> {
        let workshop = self.store.release_seat(workshop_id, self.clock.now()).await?;
        metrics::counter!("ledger.seats.released").increment(1);
        tracing::debug!(
            %workshop_id,
            current = workshop.current_registrations,
            max = workshop.max_seats,
            "Seat released"
        );
        Ok(workshop)
    }

    /// Check the stored counter against the registration rows without fixing it.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentState` when they differ and `WorkshopNotFound`
    /// for an unknown workshop.
    pub async fn verify(&self, workshop_id: WorkshopId) -> Result<()> {
        let workshop = self.load(workshop_id).await?;
        let counted = self.store.count_by_workshop(workshop_id).await?;
        if workshop.current_registrations == counted {
            Ok(())
        } else {
            Err(LedgerError::InconsistentState {
                workshop_id,
                stored: workshop.current_registrations,
                counted,
            })
        }
    }

    /// Recount and overwrite the seat counter of one workshop.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, workshop_id: WorkshopId) -> Result<ReconcileReport> {
        let report = self
            .store
            .reconcile_workshop(workshop_id, self.clock.now())
            .await?;

        if report.drifted() {
            metrics::counter!("ledger.reconcile.drift_corrected").increment(1);
            tracing::warn!(
                %workshop_id,
                before = report.before,
                after = report.after,
                status_before = %report.status_before,
                status_after = %report.status_after,
                "Corrected seat counter drift"
            );
        } else {
            tracing::debug!(%workshop_id, count = report.after, "Seat counter already correct");
        }

        Ok(report)
    }

    /// Reconcile every workshop.
    ///
    /// # Errors
    ///
    /// Stops at the first storage failure.
    pub async fn reconcile_all(&self) -> Result<Vec<ReconcileReport>> {
        let workshops = self.store.list_workshops().await?;
        let mut reports = Vec::with_capacity(workshops.len());
        for workshop in workshops {
            reports.push(self.reconcile(workshop.id).await?);
        }
        Ok(reports)
    }

    async fn load(&self, workshop_id: WorkshopId) -> Result<Workshop> {
        self.store
            .get_workshop(workshop_id)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(workshop_id))
    }
}

fn log_if_full(workshop: &Workshop) {
    if workshop.status == WorkshopStatus::Full
        && workshop.current_registrations == workshop.max_seats
    {
        tracing::info!(workshop_id = %workshop.id, max = workshop.max_seats, "Workshop is now full");
    }
}
