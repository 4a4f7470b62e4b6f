//! [`JsonFileLedgerStore`]: every storage trait over one JSON document.

use crate::file::{Snapshot, read_snapshot, snapshot_path, write_snapshot};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
use workshop_ledger_core::types::{
    FormNumber, ReconcileReport, Registration, RegistrationId, Scope, Workshop, WorkshopId,
    WorkshopStatus,
};

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    /// `None` once the store has been closed.
    state: Mutex<Option<Snapshot>>,
}

/// Ledger store persisted to `<dir>/ledger.json`.
///
/// A single async mutex serializes every operation. Mutations are applied to
/// a copy of the state, written to disk, and only then swapped in, so a
/// failed write leaves both the file and memory unchanged.
///
/// Only one process may open a data directory at a time.
#[derive(Clone, Debug)]
pub struct JsonFileLedgerStore {
    inner: Arc<Inner>,
}

fn closed() -> LedgerError {
    LedgerError::TransientStorage("ledger store is closed".to_string())
}

fn workshop_mut(snapshot: &mut Snapshot, id: WorkshopId) -> Result<&mut Workshop> {
    snapshot
        .workshops
        .iter_mut()
        .find(|w| w.id == id)
        .ok_or(LedgerError::WorkshopNotFound(id))
}

fn count(snapshot: &Snapshot, id: WorkshopId) -> u32 {
    let count = snapshot
        .registrations
        .iter()
        .filter(|r| r.workshop_id == id)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl JsonFileLedgerStore {
    /// Open (or create) the ledger in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` if the directory cannot be created or read,
    /// and `CorruptRecord` if the existing file is not a valid ledger.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            LedgerError::TransientStorage(format!("create {}: {e}", dir.display()))
        })?;

        let snapshot = read_snapshot(&dir).await?;
        tracing::info!(
            path = %snapshot_path(&dir).display(),
            workshops = snapshot.workshops.len(),
            registrations = snapshot.registrations.len(),
            "Opened JSON ledger"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                state: Mutex::new(Some(snapshot)),
            }),
        })
    }

    /// Data directory this store writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Stop accepting operations. Every later call fails with
    /// `TransientStorage`; data already on disk is untouched.
    pub async fn close(&self) {
        self.inner.state.lock().await.take();
        tracing::info!(path = %self.inner.dir.display(), "JSON ledger closed");
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Snapshot) -> T + Send,
    {
        let guard = self.inner.state.lock().await;
        guard.as_ref().map(f).ok_or_else(closed)
    }

    async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.inner.state.lock().await;
        let mut next = guard.as_ref().ok_or_else(closed)?.clone();
        let output = f(&mut next)?;
        write_snapshot(&self.inner.dir, &next).await?;
        *guard = Some(next);
        Ok(output)
    }

    async fn update_workshop<F>(&self, id: WorkshopId, f: F) -> Result<Workshop>
    where
        F: FnOnce(&mut Workshop) -> Result<()> + Send,
    {
        self.update(|snapshot| {
            let workshop = workshop_mut(snapshot, id)?;
            f(workshop)?;
            Ok(workshop.clone())
        })
        .await
    }
}

impl CounterStore for JsonFileLedgerStore {
    async fn increment_and_get(&self, scope: &Scope) -> Result<u64> {
        let key = scope.key();
        self.update(|snapshot| {
            let counter = snapshot.counters.entry(key).or_insert(0);
            *counter += 1;
            Ok(*counter)
        })
        .await
    }

    async fn current_value(&self, scope: &Scope) -> Result<u64> {
        let key = scope.key();
        self.read(|snapshot| snapshot.counters.get(&key).copied().unwrap_or(0))
            .await
    }
}

impl WorkshopStore for JsonFileLedgerStore {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        self.update(|snapshot| {
            if snapshot.workshops.iter().any(|w| w.id == workshop.id) {
                return Err(LedgerError::InvalidInput(format!(
                    "workshop {} already exists",
                    workshop.id
                )));
            }
            snapshot.workshops.push(workshop.clone());
            Ok(())
        })
        .await
    }

    async fn get_workshop(&self, id: WorkshopId) -> Result<Option<Workshop>> {
        self.read(|snapshot| snapshot.workshops.iter().find(|w| w.id == id).cloned())
            .await
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let mut workshops = self.read(|snapshot| snapshot.workshops.clone()).await?;
        workshops.sort_by_key(|w| (w.created_at, w.id));
        Ok(workshops)
    }

    async fn set_status(
        &self,
        id: WorkshopId,
        status: WorkshopStatus,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.update_workshop(id, |workshop| {
            workshop.status = status;
            workshop.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn set_max_seats(
        &self,
        id: WorkshopId,
        max_seats: u32,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.update_workshop(id, |workshop| workshop.change_max_seats(max_seats, now))
            .await
    }

    async fn set_prefix(
        &self,
        id: WorkshopId,
        cne_cpd_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        self.update_workshop(id, |workshop| {
            workshop.cne_cpd_number = cne_cpd_number;
            workshop.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn claim_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.update_workshop(id, |workshop| {
            if workshop.try_claim_seat(now) {
                Ok(())
            } else {
                Err(workshop.capacity_exceeded())
            }
        })
        .await
    }

    async fn record_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.update_workshop(id, |workshop| {
            workshop.record_seat(now);
            Ok(())
        })
        .await
    }

    async fn release_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        self.update_workshop(id, |workshop| {
            workshop.release_seat(now);
            Ok(())
        })
        .await
    }
}

impl RegistrationStore for JsonFileLedgerStore {
    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        self.update(|snapshot| {
            if !snapshot.workshops.iter().any(|w| w.id == registration.workshop_id) {
                return Err(LedgerError::WorkshopNotFound(registration.workshop_id));
            }
            for existing in snapshot
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
            snapshot.registrations.push(registration.clone());
            Ok(())
        })
        .await
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        self.read(|snapshot| snapshot.registrations.iter().find(|r| r.id == id).cloned())
            .await
    }

    async fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> Result<Option<Registration>> {
        self.read(|snapshot| {
            snapshot
                .registrations
                .iter()
                .find(|r| r.workshop_id == workshop_id && &r.form_number == form_number)
                .cloned()
        })
        .await
    }

    async fn find_by_attendee(
        &self,
        workshop_id: WorkshopId,
        mnc_uid: &str,
    ) -> Result<Option<Registration>> {
        self.read(|snapshot| {
            snapshot
                .registrations
                .iter()
                .find(|r| r.workshop_id == workshop_id && r.attendee.mnc_uid == mnc_uid)
                .cloned()
        })
        .await
    }

    async fn list_by_workshop(&self, workshop_id: WorkshopId) -> Result<Vec<Registration>> {
        self.read(|snapshot| {
            snapshot
                .registrations
                .iter()
                .filter(|r| r.workshop_id == workshop_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn delete_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        if self.get_registration(id).await?.is_none() {
            return Ok(None);
        }
        self.update(|snapshot| {
            let position = snapshot.registrations.iter().position(|r| r.id == id);
            Ok(position.map(|index| snapshot.registrations.remove(index)))
        })
        .await
    }

    async fn count_by_workshop(&self, workshop_id: WorkshopId) -> Result<u32> {
        self.read(|snapshot| count(snapshot, workshop_id)).await
    }
}

impl LedgerStore for JsonFileLedgerStore {
    async fn reconcile_workshop(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<ReconcileReport> {
        self.update(|snapshot| {
            let counted = count(snapshot, id);
            Ok(workshop_mut(snapshot, id)?.reconcile(counted, now))
        })
        .await
    }
}
