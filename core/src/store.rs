//! Storage abstraction for the ledger.
//!
//! The three traits mirror the three persisted collections: sequence counters,
//! workshops and registrations. [`LedgerStore`] ties them together and adds the
//! one operation that has to see two collections at once (reconciliation).
//!
//! # Atomicity contract
//!
//! Implementations must make each of these a single atomic step against the
//! durable store, never a read followed by an unguarded write:
//!
//! - [`CounterStore::increment_and_get`]: create-if-absent, increment, read.
//! - [`WorkshopStore::claim_seat`]: check `status == active` and
//!   `current_registrations < max_seats`, increment, flip to `full` at capacity.
//! - [`WorkshopStore::release_seat`]: decrement floored at zero, flip `full`
//!   back to `active` below capacity.
//! - [`LedgerStore::reconcile_workshop`]: count rows and overwrite the counter
//!   with no registration insert or delete interleaved.
//!
//! A failed call must leave no partial effect and report
//! [`LedgerError::TransientStorage`](crate::error::LedgerError::TransientStorage).
//!
//! # Implementations
//!
//! - `PostgresLedgerStore` (in `workshop-ledger-postgres`): production
//! - `JsonFileLedgerStore` (in `workshop-ledger-local`): single-node JSON files
//! - `InMemoryLedgerStore` (in `workshop-ledger-testing`): tests

use crate::error::Result;
use crate::types::{
    FormNumber, ReconcileReport, Registration, RegistrationId, Scope, Workshop, WorkshopId,
    WorkshopStatus,
};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Durable, atomically incrementable integer per scope.
pub trait CounterStore: Send + Sync {
    /// Create the counter at 0 if absent, add one and return the new value.
    ///
    /// Concurrent callers for the same scope never observe the same value.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` if the increment could not be applied.
    fn increment_and_get(&self, scope: &Scope) -> impl Future<Output = Result<u64>> + Send;

    /// Last issued value for the scope (0 if the counter does not exist yet).
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn current_value(&self, scope: &Scope) -> impl Future<Output = Result<u64>> + Send;
}

/// Workshop records and their seat counters.
pub trait WorkshopStore: Send + Sync {
    /// Persist a new workshop.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the id is taken, `TransientStorage` on storage failure.
    fn insert_workshop(&self, workshop: &Workshop) -> impl Future<Output = Result<()>> + Send;

    /// Load a workshop by id.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn get_workshop(
        &self,
        id: WorkshopId,
    ) -> impl Future<Output = Result<Option<Workshop>>> + Send;

    /// Every workshop, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn list_workshops(&self) -> impl Future<Output = Result<Vec<Workshop>>> + Send;

    /// Administrative status override.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist.
    fn set_status(
        &self,
        id: WorkshopId,
        status: WorkshopStatus,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;

    /// Change the capacity, refusing values below the current registrations.
    ///
    /// The `active`/`full` rule is re-applied to the new capacity.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist and
    /// `InvalidInput` if `max_seats` is zero or below `current_registrations`.
    fn set_max_seats(
        &self,
        id: WorkshopId,
        max_seats: u32,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;

    /// Replace the CNE/CPD prefix.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist.
    fn set_prefix(
        &self,
        id: WorkshopId,
        cne_cpd_number: Option<String>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;

    /// Conditionally take one seat.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist and
    /// `CapacityExceeded` if it is not active or already at capacity.
    fn claim_seat(
        &self,
        id: WorkshopId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;

    /// Take one seat for a registration that already exists.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist.
    fn record_seat(
        &self,
        id: WorkshopId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;

    /// Give back one seat, never going below zero.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist.
    fn release_seat(
        &self,
        id: WorkshopId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workshop>> + Send;
}

/// Registration rows, the source of truth for seat occupancy.
pub trait RegistrationStore: Send + Sync {
    /// Persist a new registration.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist,
    /// `DuplicateRegistration` if the attendee is already registered for it,
    /// and `DuplicateFormNumber` if the form number is taken in that workshop.
    fn insert_registration(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load a registration by id.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn get_registration(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>>> + Send;

    /// Look up a registration by its form number within a workshop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> impl Future<Output = Result<Option<Registration>>> + Send;

    /// Look up an attendee's registration within a workshop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn find_by_attendee(
        &self,
        workshop_id: WorkshopId,
        mnc_uid: &str,
    ) -> impl Future<Output = Result<Option<Registration>>> + Send;

    /// All registrations for a workshop in submission order.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn list_by_workshop(
        &self,
        workshop_id: WorkshopId,
    ) -> impl Future<Output = Result<Vec<Registration>>> + Send;

    /// Remove a registration, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn delete_registration(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>>> + Send;

    /// Number of registration rows for a workshop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    fn count_by_workshop(
        &self,
        workshop_id: WorkshopId,
    ) -> impl Future<Output = Result<u32>> + Send;
}

/// A complete ledger backend.
pub trait LedgerStore: CounterStore + WorkshopStore + RegistrationStore {
    /// Recount the workshop's registrations and overwrite its seat counter.
    ///
    /// The `active`/`full` rule is re-applied to the recounted value. Calling
    /// this twice with no mutation in between yields `before == after` the
    /// second time.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` if the workshop does not exist.
    fn reconcile_workshop(
        &self,
        id: WorkshopId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<ReconcileReport>> + Send;
}
