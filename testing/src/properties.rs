//! Property-based testing utilities using proptest.

use proptest::prelude::*;
use workshop_ledger_core::types::{Attendee, WorkshopStatus};

/// One step of a random registration workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerOp {
    /// Submit a registration for the attendee with this index.
    Submit(usize),
    /// Delete the registration at this position among the live ones (modulo).
    Delete(usize),
    /// Administratively set the workshop status.
    SetStatus(WorkshopStatus),
}

/// Any workshop status.
pub fn any_status() -> impl Strategy<Value = WorkshopStatus> {
    prop_oneof![
        Just(WorkshopStatus::Draft),
        Just(WorkshopStatus::Upcoming),
        Just(WorkshopStatus::Active),
        Just(WorkshopStatus::Full),
        Just(WorkshopStatus::Completed),
        Just(WorkshopStatus::Cancelled),
    ]
}

/// Attendees with non-blank fields.
pub fn any_attendee() -> impl Strategy<Value = Attendee> {
    ("[A-Z][a-z]{2,10} [A-Z][a-z]{2,10}", "MNC-[0-9]{6}", "[6-9][0-9]{9}")
        .prop_map(|(name, uid, mobile)| Attendee::new(&name, &uid, &mobile))
}

/// Workloads mostly made of submissions and deletions, with the occasional
/// administrative status change.
pub fn ledger_ops(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    let op = prop_oneof![
        6 => (0usize..64).prop_map(LedgerOp::Submit),
        3 => (0usize..64).prop_map(LedgerOp::Delete),
        1 => any_status().prop_map(LedgerOp::SetStatus),
    ];
    proptest::collection::vec(op, 0..max_len)
}
