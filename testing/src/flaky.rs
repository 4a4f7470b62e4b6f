//! Fault injection for ledger stores
//!
//! [`FlakyStore`] wraps any [`LedgerStore`] and makes chosen operations fail
//! with [`LedgerError::TransientStorage`] before they reach the inner store,
//! so the inner store is left exactly as it was.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
use workshop_ledger_core::types::{
    FormNumber, ReconcileReport, Registration, RegistrationId, Scope, Workshop, WorkshopId,
    WorkshopStatus,
};

/// Store operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`CounterStore::increment_and_get`]
    IncrementCounter,
    /// [`WorkshopStore::get_workshop`]
    GetWorkshop,
    /// [`WorkshopStore::claim_seat`]
    ClaimSeat,
    /// [`WorkshopStore::record_seat`]
    RecordSeat,
    /// [`WorkshopStore::release_seat`]
    ReleaseSeat,
    /// [`RegistrationStore::insert_registration`]
    InsertRegistration,
    /// [`RegistrationStore::delete_registration`]
    DeleteRegistration,
    /// [`LedgerStore::reconcile_workshop`]
    Reconcile,
}

#[derive(Debug, Default)]
struct Faults {
    remaining: HashMap<Operation, usize>,
    injected: HashMap<Operation, usize>,
}

/// A store wrapper that fails selected operations on demand.
///
/// # Example
///
/// ```
/// use workshop_ledger_core::store::CounterStore;
/// use workshop_ledger_core::types::Scope;
/// use workshop_ledger_testing::{FlakyStore, InMemoryLedgerStore, Operation};
///
/// # async fn example() {
/// let store = FlakyStore::new(InMemoryLedgerStore::new());
/// store.fail_times(Operation::IncrementCounter, 1);
///
/// assert!(store.increment_and_get(&Scope::Global).await.is_err());
/// assert_eq!(store.increment_and_get(&Scope::Global).await.ok(), Some(1));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FlakyStore<S> {
    inner: S,
    faults: Arc<Mutex<Faults>>,
}

impl<S> FlakyStore<S> {
    /// Wrap a store with no faults configured.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `times` calls of `operation`.
    pub fn fail_times(&self, operation: Operation, times: usize) {
        self.faults.lock().unwrap().remaining.insert(operation, times);
    }

    /// Fail every call of `operation` until [`heal`](Self::heal) is called.
    pub fn fail_always(&self, operation: Operation) {
        self.fail_times(operation, usize::MAX);
    }

    /// Remove every configured fault.
    pub fn heal(&self) {
        self.faults.lock().unwrap().remaining.clear();
    }

    /// How many failures were injected for `operation` so far.
    #[must_use]
    pub fn injected(&self, operation: Operation) -> usize {
        self.faults
            .lock()
            .unwrap()
            .injected
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, operation: Operation) -> Result<()> {
        let mut faults = self.faults.lock().unwrap();
        let Some(remaining) = faults.remaining.get_mut(&operation) else {
            return Ok(());
        };
        if *remaining == 0 {
            return Ok(());
        }
        if *remaining != usize::MAX {
            *remaining -= 1;
        }
        *faults.injected.entry(operation).or_insert(0) += 1;
        Err(LedgerError::TransientStorage(format!(
            "injected failure: {operation:?}"
        )))
    }
}

impl<S: CounterStore> CounterStore for FlakyStore<S> {
    async fn increment_and_get(&self, scope: &Scope) -> Result<u64> {
        self.check(Operation::IncrementCounter)?;
        self.inner.increment_and_get(scope).await
    }

    async fn current_value(&self, scope: &Scope) -> Result<u64> {
        self.inner.current_value(scope).await
    }
}

impl<S: WorkshopStore> WorkshopStore for FlakyStore<S> {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        self.inner.insert_workshop(workshop).await
    }

    async fn get_workshop(&self, id: WorkshopId) -> Result<Option<Workshop>> {
        self.check(Operation::GetWorkshop)?;
        self.inner.get_workshop(id).await
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        self.inner.list_workshops().await
    }

    async fn set_status(
        &self,
        id: WorkshopId,
        status: WorkshopStatus,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.inner.set_status(id, status, now).await
    }

    async fn set_max_seats(
        &self,
        id: WorkshopId,
        max_seats: u32,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.inner.set_max_seats(id, max_seats, now).await
    }

    async fn set_prefix(
        &self,
        id: WorkshopId,
        cne_cpd_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.inner.set_prefix(id, cne_cpd_number, now).await
    }

    async fn claim_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.check(Operation::ClaimSeat)?;
        self.inner.claim_seat(id, now).await
    }

    async fn record_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.check(Operation::RecordSeat)?;
        self.inner.record_seat(id, now).await
    }

    async fn release_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.check(Operation::ReleaseSeat)?;
        self.inner.release_seat(id, now).await
    }
}

impl<S: RegistrationStore> RegistrationStore for FlakyStore<S> {
    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        self.check(Operation::InsertRegistration)?;
        self.inner.insert_registration(registration).await
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        self.inner.get_registration(id).await
    }

    async fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> Result<Option<Registration>> {
        self.inner.find_by_form_number(workshop_id, form_number).await
    }

    async fn find_by_attendee(
        &self,
        workshop_id: WorkshopId,
        mnc_uid: &str,
    ) -> Result<Option<Registration>> {
        self.inner.find_by_attendee(workshop_id, mnc_uid).await
    }

    async fn list_by_workshop(&self, workshop_id: WorkshopId) -> Result<Vec<Registration>> {
        self.inner.list_by_workshop(workshop_id).await
    }

    async fn delete_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        self.check(Operation::DeleteRegistration)?;
        self.inner.delete_registration(id).await
    }

    async fn count_by_workshop(&self, workshop_id: WorkshopId) -> Result<u32> {
        self.inner.count_by_workshop(workshop_id).await
    }
}

impl<S: LedgerStore> LedgerStore for FlakyStore<S> {
    async fn reconcile_workshop(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<ReconcileReport> {
        self.check(Operation::Reconcile)?;
        self.inner.reconcile_workshop(id, now).await
    }
}
