//! Seat claims, releases and reconciliation against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use std::sync::Arc;
use workshop_ledger_core::capacity::CapacityTracker;
use workshop_ledger_core::error::LedgerError;
use workshop_ledger_core::store::WorkshopStore;
use workshop_ledger_core::types::{WorkshopId, WorkshopStatus};
use workshop_ledger_testing::{
    InMemoryLedgerStore, WorkshopBuilder, attendee, registration_for, test_clock,
};

fn tracker(store: &Arc<InMemoryLedgerStore>) -> CapacityTracker<InMemoryLedgerStore> {
    CapacityTracker::new(Arc::clone(store), Arc::new(test_clock()))
}

#[tokio::test]
async fn can_accept_requires_active_and_free_seat() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let open = WorkshopBuilder::new().max_seats(2).current_registrations(1).build();
    let full = WorkshopBuilder::new().max_seats(2).current_registrations(2).build();
    let upcoming = WorkshopBuilder::new().status(WorkshopStatus::Upcoming).build();
    for w in [&open, &full, &upcoming] {
        store.insert_workshop(w).await.unwrap();
    }
    let tracker = tracker(&store);

    assert!(tracker.can_accept_registration(open.id).await.unwrap());
    assert!(!tracker.can_accept_registration(full.id).await.unwrap());
    assert!(!tracker.can_accept_registration(upcoming.id).await.unwrap());
    assert!(matches!(
        tracker.can_accept_registration(WorkshopId::new()).await,
        Err(LedgerError::WorkshopNotFound(_))
    ));
}

#[tokio::test]
async fn created_then_deleted_walks_active_full_active() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new().max_seats(2).build();
    store.insert_workshop(&workshop).await.unwrap();
    let tracker = tracker(&store);

    let w = tracker.on_registration_created(workshop.id).await.unwrap();
    assert_eq!((w.current_registrations, w.status), (1, WorkshopStatus::Active));
    let w = tracker.on_registration_created(workshop.id).await.unwrap();
    assert_eq!((w.current_registrations, w.status), (2, WorkshopStatus::Full));
    let w = tracker.on_registration_deleted(workshop.id).await.unwrap();
    assert_eq!((w.current_registrations, w.status), (1, WorkshopStatus::Active));
}

#[tokio::test]
async fn release_on_empty_workshop_stays_at_zero() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new().build();
    store.insert_workshop(&workshop).await.unwrap();
    let tracker = tracker(&store);

    let w = tracker.on_registration_deleted(workshop.id).await.unwrap();
    assert_eq!(w.current_registrations, 0);
    assert_eq!(w.status, WorkshopStatus::Active);
}

#[tokio::test]
async fn administrative_status_survives_seat_changes() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new()
        .max_seats(2)
        .current_registrations(2)
        .status(WorkshopStatus::Cancelled)
        .build();
    store.insert_workshop(&workshop).await.unwrap();
    let tracker = tracker(&store);

    let w = tracker.on_registration_deleted(workshop.id).await.unwrap();
    assert_eq!(w.status, WorkshopStatus::Cancelled);
    let w = tracker.on_registration_created(workshop.id).await.unwrap();
    assert_eq!(w.status, WorkshopStatus::Cancelled);

    let err = tracker.claim_seat(workshop.id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::CapacityExceeded { status: WorkshopStatus::Cancelled, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_overbook() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new().max_seats(5).build();
    store.insert_workshop(&workshop).await.unwrap();
    let tracker = tracker(&store);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.claim_seat(workshop.id).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let granted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::CapacityExceeded { .. })))
        .count();
    assert_eq!((granted, rejected), (5, 45));
    let stored = store.get_workshop(workshop.id).await.unwrap().unwrap();
    assert_eq!(stored.current_registrations, 5);
    assert_eq!(stored.status, WorkshopStatus::Full);
}

#[tokio::test]
async fn verify_reports_drift_and_reconcile_repairs_it() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new().max_seats(2).build();
    store.insert_workshop(&workshop).await.unwrap();
    store.force_insert_registration(registration_for(workshop.id, "CPD-0001", attendee(1)));
    store.force_insert_registration(registration_for(workshop.id, "CPD-0002", attendee(2)));
    let tracker = tracker(&store);

    assert_eq!(
        tracker.verify(workshop.id).await.unwrap_err(),
        LedgerError::InconsistentState {
            workshop_id: workshop.id,
            stored: 0,
            counted: 2,
        }
    );

    let report = tracker.reconcile(workshop.id).await.unwrap();
    assert_eq!((report.before, report.after), (0, 2));
    assert_eq!(report.status_after, WorkshopStatus::Full);
    tracker.verify(workshop.id).await.unwrap();
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let workshop = WorkshopBuilder::new().max_seats(4).build();
    store.insert_workshop(&workshop).await.unwrap();
    store.force_insert_registration(registration_for(workshop.id, "CPD-0001", attendee(1)));
    store.force_registration_count(workshop.id, 3);
    let tracker = tracker(&store);

    let first = tracker.reconcile(workshop.id).await.unwrap();
    assert!(first.drifted());
    let second = tracker.reconcile(workshop.id).await.unwrap();
    assert!(!second.drifted());
    assert_eq!(second.before, second.after);
    assert_eq!(second.after, 1);
}

#[tokio::test]
async fn reconcile_all_covers_every_workshop() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clean = WorkshopBuilder::new().title("Clean").build();
    let drifted = WorkshopBuilder::new().title("Drifted").current_registrations(4).build();
    store.insert_workshop(&clean).await.unwrap();
    store.insert_workshop(&drifted).await.unwrap();

    let reports = tracker(&store).reconcile_all().await.unwrap();
    assert_eq!(reports.len(), 2);
    let fixed: Vec<_> = reports.iter().filter(|r| r.drifted()).collect();
    assert_eq!(fixed.len(), 1);
    assert_eq!(fixed[0].title, "Drifted");
    assert_eq!((fixed[0].before, fixed[0].after), (4, 0));
}

#[tokio::test]
async fn reconcile_unknown_workshop_is_not_found() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let id = WorkshopId::new();
    assert_eq!(
        tracker(&store).reconcile(id).await.unwrap_err(),
        LedgerError::WorkshopNotFound(id)
    );
}
