//! Error taxonomy for the ledger.
//!
//! Every failure the ledger surfaces is one of these variants; none are folded
//! into a generic error so callers can branch on them.

use crate::types::{FormNumber, RegistrationId, WorkshopId, WorkshopStatus};
use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Storage round-trip failed (I/O, pool exhaustion, lock contention).
    ///
    /// Nothing was applied. Callers may retry with backoff.
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    /// The workshop cannot take another registration.
    #[error(
        "Workshop {workshop_id} cannot accept registrations ({current_registrations}/{max_seats}, status {status})"
    )]
    CapacityExceeded {
        /// Workshop that rejected the registration.
        workshop_id: WorkshopId,
        /// Seat capacity.
        max_seats: u32,
        /// Seats consumed when the rejection happened.
        current_registrations: u32,
        /// Status when the rejection happened.
        status: WorkshopStatus,
    },

    /// No workshop exists with this id.
    #[error("Workshop not found: {0}")]
    WorkshopNotFound(WorkshopId),

    /// No registration exists with this id.
    #[error("Registration not found: {0}")]
    RegistrationNotFound(RegistrationId),

    /// Stored seat counter disagrees with the registration rows.
    #[error("Inconsistent state for workshop {workshop_id}: stored {stored}, counted {counted}")]
    InconsistentState {
        /// Workshop with drift.
        workshop_id: WorkshopId,
        /// Value of `current_registrations`.
        stored: u32,
        /// Number of registration rows.
        counted: u32,
    },

    /// The attendee is already registered for this workshop.
    #[error("Attendee {mnc_uid} is already registered for workshop {workshop_id}")]
    DuplicateRegistration {
        /// Target workshop.
        workshop_id: WorkshopId,
        /// Attendee's MNC UID.
        mnc_uid: String,
    },

    /// A registration with this form number already exists.
    #[error("Form number already in use: {0}")]
    DuplicateFormNumber(FormNumber),

    /// Request failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted data could not be decoded.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl LedgerError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStorage(_))
    }

    /// Whether this is a definitive business rejection to show the submitter.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::DuplicateRegistration { .. }
                | Self::DuplicateFormNumber(_)
                | Self::InvalidInput(_)
        )
    }

    /// Whether the referenced workshop or registration does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkshopNotFound(_) | Self::RegistrationNotFound(_)
        )
    }

    /// Short stable label for the variant, used in logs and batch reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TransientStorage(_) => "transient_storage",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::WorkshopNotFound(_) => "workshop_not_found",
            Self::RegistrationNotFound(_) => "registration_not_found",
            Self::InconsistentState { .. } => "inconsistent_state",
            Self::DuplicateRegistration { .. } => "duplicate_registration",
            Self::DuplicateFormNumber(_) => "duplicate_form_number",
            Self::InvalidInput(_) => "invalid_input",
            Self::CorruptRecord(_) => "corrupt_record",
        }
    }
}
