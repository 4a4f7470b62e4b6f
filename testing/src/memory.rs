//! In-memory ledger store
//!
//! Every operation takes the single write lock for its whole duration, which
//! makes each trait method atomic with respect to the others. The lock is
//! never held across an `.await`.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
use workshop_ledger_core::types::{
    FormNumber, ReconcileReport, Registration, RegistrationId, Scope, Workshop, WorkshopId,
    WorkshopStatus,
};

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, u64>,
    workshops: HashMap<WorkshopId, Workshop>,
    registrations: Vec<Registration>,
}

impl State {
    fn workshop_mut(&mut self, id: WorkshopId) -> Result<&mut Workshop> {
        self.workshops
            .get_mut(&id)
            .ok_or(LedgerError::WorkshopNotFound(id))
    }

    fn count(&self, id: WorkshopId) -> u32 {
        let count = self
            .registrations
            .iter()
            .filter(|r| r.workshop_id == id)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// In-memory implementation of every ledger storage trait.
///
/// # Example
///
/// ```
/// use workshop_ledger_core::store::CounterStore;
/// use workshop_ledger_core::types::Scope;
/// use workshop_ledger_testing::InMemoryLedgerStore;
///
/// # async fn example() -> workshop_ledger_core::Result<()> {
/// let store = InMemoryLedgerStore::new();
/// assert_eq!(store.increment_and_get(&Scope::Global).await?, 1);
/// assert_eq!(store.increment_and_get(&Scope::Global).await?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a workshop's seat counter without touching registrations.
    ///
    /// Simulates drift from a crash or a manual database edit.
    pub fn force_registration_count(&self, id: WorkshopId, count: u32) {
        if let Some(workshop) = self.state.write().unwrap().workshops.get_mut(&id) {
            workshop.current_registrations = count;
        }
    }

    /// Insert a registration row without going through any seat accounting.
    pub fn force_insert_registration(&self, registration: Registration) {
        self.state.write().unwrap().registrations.push(registration);
    }

    /// Number of stored registrations across all workshops.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.state.read().unwrap().registrations.len()
    }

    /// Clear all data (for test isolation)
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.counters.clear();
        state.workshops.clear();
        state.registrations.clear();
    }
}

impl CounterStore for InMemoryLedgerStore {
    async fn increment_and_get(&self, scope: &Scope) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let counter = state.counters.entry(scope.key()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn current_value(&self, scope: &Scope) -> Result<u64> {
        Ok(self
            .state
            .read()
            .unwrap()
            .counters
            .get(&scope.key())
            .copied()
            .unwrap_or(0))
    }
}

impl WorkshopStore for InMemoryLedgerStore {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.workshops.contains_key(&workshop.id) {
            return Err(LedgerError::InvalidInput(format!(
                "workshop {} already exists",
                workshop.id
            )));
        }
        state.workshops.insert(workshop.id, workshop.clone());
        Ok(())
    }

    async fn get_workshop(&self, id: WorkshopId) -> Result<Option<Workshop>> {
        Ok(self.state.read().unwrap().workshops.get(&id).cloned())
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let mut workshops: Vec<Workshop> =
            self.state.read().unwrap().workshops.values().cloned().collect();
        workshops.sort_by_key(|w| (w.created_at, w.id));
        Ok(workshops)
    }

    async fn set_status(
        &self,
        id: WorkshopId,
        status: WorkshopStatus,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        workshop.status = status;
        workshop.updated_at = now;
        Ok(workshop.clone())
    }

    async fn set_max_seats(
        &self,
        id: WorkshopId,
        max_seats: u32,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        workshop.change_max_seats(max_seats, now)?;
        Ok(workshop.clone())
    }

    async fn set_prefix(
        &self,
        id: WorkshopId,
        cne_cpd_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        workshop.cne_cpd_number = cne_cpd_number;
        workshop.updated_at = now;
        Ok(workshop.clone())
    }

    async fn claim_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        if workshop.try_claim_seat(now) {
            Ok(workshop.clone())
        } else {
            Err(workshop.capacity_exceeded())
        }
    }

    async fn record_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        workshop.record_seat(now);
        Ok(workshop.clone())
    }

    async fn release_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let mut state = self.state.write().unwrap();
        let workshop = state.workshop_mut(id)?;
        workshop.release_seat(now);
        Ok(workshop.clone())
    }
}

impl RegistrationStore for InMemoryLedgerStore {
    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if !state.workshops.contains_key(&registration.workshop_id) {
            return Err(LedgerError::WorkshopNotFound(registration.workshop_id));
        }
        for existing in state
            .registrations
            .iter()
            .filter(|r| r.workshop_id == registration.workshop_id)
        {
            if existing.attendee.mnc_uid == registration.attendee.mnc_uid {
                return Err(LedgerError::DuplicateRegistration {
                    workshop_id: registration.workshop_id,
                    mnc_uid: registration.attendee.mnc_uid.clone(),
                });
            }
            if existing.form_number == registration.form_number {
                return Err(LedgerError::DuplicateFormNumber(
                    registration.form_number.clone(),
                ));
            }
        }
        state.registrations.push(registration.clone());
        Ok(())
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .registrations
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> Result<Option<Registration>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .registrations
            .iter()
            .find(|r| r.workshop_id == workshop_id && &r.form_number == form_number)
            .cloned())
    }

    async fn find_by_attendee(
        &self,
        workshop_id: WorkshopId,
        mnc_uid: &str,
    ) -> Result<Option<Registration>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .registrations
            .iter()
            .find(|r| r.workshop_id == workshop_id && r.attendee.mnc_uid == mnc_uid)
            .cloned())
    }

    async fn list_by_workshop(&self, workshop_id: WorkshopId) -> Result<Vec<Registration>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .registrations
            .iter()
            .filter(|r| r.workshop_id == workshop_id)
            .cloned()
            .collect())
    }

    async fn delete_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        let mut state = self.state.write().unwrap();
        let position = state.registrations.iter().position(|r| r.id == id);
        Ok(position.map(|index| state.registrations.remove(index)))
    }

    async fn count_by_workshop(&self, workshop_id: WorkshopId) -> Result<u32> {
        Ok(self.state.read().unwrap().count(workshop_id))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    async fn reconcile_workshop(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut state = self.state.write().unwrap();
        let counted = state.count(id);
        let workshop = state.workshop_mut(id)?;
        Ok(workshop.reconcile(counted, now))
    }
}
