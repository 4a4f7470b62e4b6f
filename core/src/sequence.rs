//! Form-number issuing.
//!
//! The issuer is the only writer of sequence counters. Numbers are never
//! reused: a number issued for a submission that later fails, or for a
//! registration that is later deleted, stays consumed.

use crate::error::{LedgerError, Result};
use crate::store::{CounterStore, WorkshopStore};
use crate::types::{DEFAULT_FORM_PREFIX, FormNumber, Scope, WorkshopId};
use std::sync::Arc;

/// Issues `<prefix>-<sequence>` form numbers per workshop.
#[derive(Debug)]
pub struct SequenceIssuer<S> {
    store: Arc<S>,
}

impl<S> Clone for SequenceIssuer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CounterStore + WorkshopStore> SequenceIssuer<S> {
    /// Create an issuer over the given store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Next form number for a workshop, e.g. `CPD-0001`.
    ///
    /// The prefix is the workshop's CNE/CPD number, or `REG` when it has none.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop and
    /// `TransientStorage` if the counter could not be incremented. No number
    /// is produced in either case.
    #[tracing::instrument(skip(self))]
    pub async fn next_form_number(&self, workshop_id: WorkshopId) -> Result<FormNumber> {
        let workshop = self
            .store
            .get_workshop(workshop_id)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(workshop_id))?;
        let prefix = workshop.form_prefix().unwrap_or(DEFAULT_FORM_PREFIX);

        self.issue(&Scope::Workshop(workshop_id), prefix).await
    }

    /// Next number from the global counter, always prefixed `REG`.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` if the counter could not be incremented.
    #[tracing::instrument(skip(self))]
    pub async fn next_global_form_number(&self) -> Result<FormNumber> {
        self.issue(&Scope::Global, DEFAULT_FORM_PREFIX).await
    }

    /// Last sequence issued for a scope.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    pub async fn last_issued(&self, scope: &Scope) -> Result<u64> {
        self.store.current_value(scope).await
    }

    async fn issue(&self, scope: &Scope, prefix: &str) -> Result<FormNumber> {
        let sequence = self.store.increment_and_get(scope).await.map_err(|e| {
            tracing::warn!(scope = %scope, error = %e, "Failed to increment sequence counter");
            e
        })?;
        let form_number = FormNumber::format(prefix, sequence);

        metrics::counter!("ledger.form_numbers.issued").increment(1);
        tracing::debug!(scope = %scope, %form_number, "Issued form number");

        Ok(form_number)
    }
}
