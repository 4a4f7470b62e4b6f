//! `JsonFileLedgerStore` behaviour against real temp directories.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use std::sync::Arc;
use workshop_ledger_core::environment::Clock;
use workshop_ledger_core::error::LedgerError;
use workshop_ledger_core::ledger::RegistrationLedger;
use workshop_ledger_core::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
use workshop_ledger_core::types::{Scope, WorkshopStatus};
use workshop_ledger_local::{JsonFileLedgerStore, LEDGER_FILENAME};
use workshop_ledger_testing::{
    WorkshopBuilder, attendee, init_tracing, registration_for, test_clock, website_request,
};

#[tokio::test]
async fn ledger_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let workshop = WorkshopBuilder::new().prefix("1001").max_seats(3).build();

    {
        let store = Arc::new(JsonFileLedgerStore::open(dir.path()).await.unwrap());
        store.insert_workshop(&workshop).await.unwrap();
        let ledger = RegistrationLedger::new(Arc::clone(&store), Arc::new(test_clock()));
        ledger.submit(website_request(workshop.id, 1)).await.unwrap();
        ledger.submit(website_request(workshop.id, 2)).await.unwrap();
        store.close().await;
    }

    let store = Arc::new(JsonFileLedgerStore::open(dir.path()).await.unwrap());
    let w = store.get_workshop(workshop.id).await.unwrap().unwrap();
    assert_eq!(w.current_registrations, 2);
    assert_eq!(
        store.current_value(&Scope::Workshop(workshop.id)).await.unwrap(),
        2
    );

    let ledger = RegistrationLedger::new(Arc::clone(&store), Arc::new(test_clock()));
    let third = ledger.submit(website_request(workshop.id, 3)).await.unwrap();
    assert_eq!(third.form_number.as_str(), "1001-0003");

    let w = store.get_workshop(workshop.id).await.unwrap().unwrap();
    assert_eq!((w.current_registrations, w.status), (3, WorkshopStatus::Full));
    assert!(dir.path().join(LEDGER_FILENAME).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_overbook() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileLedgerStore::open(dir.path()).await.unwrap());
    let workshop = WorkshopBuilder::new().max_seats(4).build();
    store.insert_workshop(&workshop).await.unwrap();
    let ledger = RegistrationLedger::new(Arc::clone(&store), Arc::new(test_clock()));

    let results = futures::future::join_all(
        (0..12).map(|n| ledger.submit(website_request(workshop.id, n))),
    )
    .await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::CapacityExceeded { .. })))
        .count();
    assert_eq!((accepted, rejected), (4, 8));
    assert_eq!(store.count_by_workshop(workshop.id).await.unwrap(), 4);
}

#[tokio::test]
async fn reconcile_repairs_drift_found_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileLedgerStore::open(dir.path()).await.unwrap();
    let workshop = WorkshopBuilder::new()
        .max_seats(2)
        .current_registrations(2)
        .status(WorkshopStatus::Full)
        .build();
    store.insert_workshop(&workshop).await.unwrap();
    store
        .insert_registration(&registration_for(workshop.id, "CPD-0001", attendee(1)))
        .await
        .unwrap();

    let report = store
        .reconcile_workshop(workshop.id, test_clock().now())
        .await
        .unwrap();
    assert_eq!((report.before, report.after), (2, 1));
    store.close().await;

    let reopened = JsonFileLedgerStore::open(dir.path()).await.unwrap();
    let w = reopened.get_workshop(workshop.id).await.unwrap().unwrap();
    assert_eq!((w.current_registrations, w.status), (1, WorkshopStatus::Active));
}

#[tokio::test]
async fn duplicates_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileLedgerStore::open(dir.path()).await.unwrap();
    let workshop = WorkshopBuilder::new().build();
    store.insert_workshop(&workshop).await.unwrap();
    store
        .insert_registration(&registration_for(workshop.id, "CPD-0001", attendee(1)))
        .await
        .unwrap();

    assert!(matches!(
        store
            .insert_registration(&registration_for(workshop.id, "CPD-0002", attendee(1)))
            .await,
        Err(LedgerError::DuplicateRegistration { .. })
    ));
    assert!(matches!(
        store
            .insert_registration(&registration_for(workshop.id, "CPD-0001", attendee(2)))
            .await,
        Err(LedgerError::DuplicateFormNumber(_))
    ));
    assert!(matches!(
        store.insert_workshop(&workshop).await,
        Err(LedgerError::InvalidInput(_))
    ));
}
