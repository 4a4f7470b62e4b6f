//! Registration submission and deletion.
//!
//! # Submission order
//!
//! 1. Validate the attendee.
//! 2. Load the workshop and reject early if it cannot accept registrations.
//! 3. Reject an attendee already registered for the workshop.
//! 4. Claim a seat with the store's conditional increment.
//! 5. Issue a form number.
//! 6. Persist the registration.
//!
//! The seat is claimed before the row exists so two concurrent submissions
//! can never both take the last seat. If step 5 or 6 fails the seat is given
//! back and the original error is returned; a form number issued in step 5
//! stays consumed. If giving the seat back also fails, the counter is one
//! too high until the workshop is reconciled.

use crate::capacity::CapacityTracker;
use crate::environment::Clock;
use crate::error::{LedgerError, Result};
use crate::sequence::SequenceIssuer;
use crate::store::LedgerStore;
use crate::types::{
    Attendee, FormNumber, Registration, RegistrationId, RegistrationRequest, WorkshopId,
};
use std::sync::Arc;

/// Outcome of one row in a batch submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRow {
    /// Position of the request in the submitted batch.
    pub index: usize,
    /// Created registration or the reason the row was refused.
    pub result: Result<Registration>,
}

/// Per-row results of [`RegistrationLedger::submit_batch`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// One entry per request, in input order.
    pub rows: Vec<BatchRow>,
}

impl BatchOutcome {
    /// Rows that produced a registration.
    pub fn succeeded(&self) -> impl Iterator<Item = (usize, &Registration)> {
        self.rows
            .iter()
            .filter_map(|row| row.result.as_ref().ok().map(|r| (row.index, r)))
    }

    /// Rows that were refused, with the reason.
    pub fn failed(&self) -> impl Iterator<Item = (usize, &LedgerError)> {
        self.rows
            .iter()
            .filter_map(|row| row.result.as_ref().err().map(|e| (row.index, e)))
    }

    /// Number of successful rows.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    /// Number of refused rows.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }
}

/// Creates and deletes registrations while keeping seats and form numbers consistent.
pub struct RegistrationLedger<S> {
    store: Arc<S>,
    issuer: SequenceIssuer<S>,
    capacity: CapacityTracker<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RegistrationLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            issuer: self.issuer.clone(),
            capacity: self.capacity.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LedgerStore> RegistrationLedger<S> {
    /// Create a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer: SequenceIssuer::new(Arc::clone(&store)),
            capacity: CapacityTracker::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// The sequence issuer this ledger draws form numbers from.
    #[must_use]
    pub const fn issuer(&self) -> &SequenceIssuer<S> {
        &self.issuer
    }

    /// The capacity tracker this ledger claims seats through.
    #[must_use]
    pub const fn capacity(&self) -> &CapacityTracker<S> {
        &self.capacity
    }

    /// Register an attendee for a workshop.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when an attendee field is blank
    /// - `WorkshopNotFound` for an unknown workshop
    /// - `CapacityExceeded` when the workshop is not active or has no seat left
    /// - `DuplicateRegistration` when the attendee is already registered
    /// - `TransientStorage` when storage failed; nothing is left claimed
    #[tracing::instrument(skip(self, request), fields(workshop_id = %request.workshop_id, source = request.source.as_str()))]
    pub async fn submit(&self, request: RegistrationRequest) -> Result<Registration> {
        let attendee = request.attendee.normalized()?;
        let workshop_id = request.workshop_id;

        let workshop = self
            .store
            .get_workshop(workshop_id)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(workshop_id))?;
        if !workshop.can_accept_registration() {
            metrics::counter!("ledger.capacity.rejected").increment(1);
            tracing::info!(
                status = %workshop.status,
                current = workshop.current_registrations,
                max = workshop.max_seats,
                "Workshop not accepting registrations"
            );
            return Err(workshop.capacity_exceeded());
        }

        if self
            .store
            .find_by_attendee(workshop_id, &attendee.mnc_uid)
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateRegistration {
                workshop_id,
                mnc_uid: attendee.mnc_uid,
            });
        }

        self.capacity.claim_seat(workshop_id).await?;

        let registration = match self.issue_and_insert(request, attendee).await {
            Ok(registration) => registration,
            Err(e) => {
                self.give_back_seat(workshop_id, &e).await;
                return Err(e);
            }
        };

        metrics::counter!("ledger.registrations.submitted").increment(1);
        tracing::info!(
            registration_id = %registration.id,
            form_number = %registration.form_number,
            "Registration submitted"
        );
        Ok(registration)
    }

    /// Submit each request independently, collecting per-row results.
    ///
    /// A refused row never stops the rest of the batch.
    #[tracing::instrument(skip(self, requests), fields(rows = requests.len()))]
    pub async fn submit_batch(&self, requests: Vec<RegistrationRequest>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, request) in requests.into_iter().enumerate() {
            let result = self.submit(request).await;
            if let Err(e) = &result {
                tracing::debug!(index, error = %e, kind = e.kind(), "Batch row refused");
            }
            outcome.rows.push(BatchRow { index, result });
        }
        tracing::info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            "Batch submission finished"
        );
        outcome
    }

    /// Delete a registration and release its seat.
    ///
    /// The form number is not returned to the sequence.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationNotFound` for an unknown id. If the row was removed
    /// but the seat could not be released, that storage error is returned and
    /// the workshop needs reconciliation.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, registration_id: RegistrationId) -> Result<Registration> {
        let registration = self
            .store
            .delete_registration(registration_id)
            .await?
            .ok_or(LedgerError::RegistrationNotFound(registration_id))?;

        if let Err(e) = self
            .capacity
            .on_registration_deleted(registration.workshop_id)
            .await
        {
            metrics::counter!("ledger.compensation.failed").increment(1);
            tracing::error!(
                workshop_id = %registration.workshop_id,
                error = %e,
                "Registration deleted but seat not released; reconcile the workshop"
            );
            return Err(e);
        }

        metrics::counter!("ledger.registrations.deleted").increment(1);
        tracing::info!(
            workshop_id = %registration.workshop_id,
            form_number = %registration.form_number,
            "Registration deleted"
        );
        Ok(registration)
    }

    /// Load a registration by id.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationNotFound` for an unknown id.
    pub async fn get(&self, registration_id: RegistrationId) -> Result<Registration> {
        self.store
            .get_registration(registration_id)
            .await?
            .ok_or(LedgerError::RegistrationNotFound(registration_id))
    }

    /// Look up a registration by form number within a workshop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    pub async fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> Result<Option<Registration>> {
        self.store.find_by_form_number(workshop_id, form_number).await
    }

    /// All registrations of a workshop.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    pub async fn registrations_for(&self, workshop_id: WorkshopId) -> Result<Vec<Registration>> {
        if self.store.get_workshop(workshop_id).await?.is_none() {
            return Err(LedgerError::WorkshopNotFound(workshop_id));
        }
        self.store.list_by_workshop(workshop_id).await
    }

    async fn issue_and_insert(
        &self,
        request: RegistrationRequest,
        attendee: Attendee,
    ) -> Result<Registration> {
        let form_number = self.issuer.next_form_number(request.workshop_id).await?;
        let registration = Registration {
            id: RegistrationId::new(),
            workshop_id: request.workshop_id,
            form_number,
            attendee,
            source: request.source,
            submitted_by: request
                .submitted_by
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            submitted_at: self.clock.now(),
        };
        self.store.insert_registration(&registration).await?;
        Ok(registration)
    }

    async fn give_back_seat(&self, workshop_id: WorkshopId, cause: &LedgerError) {
        if let Err(e) = self.capacity.on_registration_deleted(workshop_id).await {
            metrics::counter!("ledger.compensation.failed").increment(1);
            tracing::error!(
                %workshop_id,
                cause = %cause,
                error = %e,
                "Failed to release seat after aborted submission; reconcile the workshop"
            );
        } else {
            tracing::debug!(%workshop_id, cause = %cause, "Released seat of aborted submission");
        }
    }
}
