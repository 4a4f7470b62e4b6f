//! Domain types for the workshop registration ledger.
//!
//! Identifiers, the workshop and registration records, the form-number value
//! object and the reconciliation report. The seat-transition rules that every
//! storage backend shares also live here, on [`Workshop`], so the in-memory and
//! file-backed stores apply exactly the same arithmetic the SQL backend encodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a workshop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkshopId(Uuid);

impl WorkshopId {
    /// Creates a new random `WorkshopId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `WorkshopId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkshopId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkshopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkshopId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| LedgerError::InvalidInput(format!("invalid workshop id {s:?}: {e}")))
    }
}

/// Unique identifier for a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    /// Creates a new random `RegistrationId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RegistrationId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegistrationId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| LedgerError::InvalidInput(format!("invalid registration id {s:?}: {e}")))
    }
}

/// The unit a sequence counter is keyed by.
///
/// Each workshop owns one counter; form numbers requested without a workshop
/// draw from the single global counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Counter owned by one workshop.
    Workshop(WorkshopId),
    /// Fallback counter shared by everything without a workshop.
    Global,
}

impl Scope {
    /// Persisted key for this scope (`workshop:<uuid>` or `global`).
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Workshop(id) => format!("workshop:{id}"),
            Self::Global => "global".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ============================================================================
// Workshop
// ============================================================================

/// Lifecycle status of a workshop.
///
/// Only `Active ⇄ Full` is driven by seat occupancy; every other transition is
/// administrative and never reverted automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkshopStatus {
    /// Being prepared, not visible.
    Draft,
    /// Announced, registration not yet open.
    Upcoming,
    /// Accepting registrations.
    Active,
    /// Every seat is taken.
    Full,
    /// Workshop took place.
    Completed,
    /// Called off by an administrator.
    Cancelled,
}

impl WorkshopStatus {
    /// Convert status to its persisted string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Full => "full",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkshopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkshopStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "full" => Ok(Self::Full),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(LedgerError::CorruptRecord(format!(
                "unknown workshop status: {other}"
            ))),
        }
    }
}

/// A workshop and its seat ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workshop {
    /// Workshop identifier.
    pub id: WorkshopId,
    /// Display title.
    pub title: String,
    /// CNE/CPD number, used as the form-number prefix.
    pub cne_cpd_number: Option<String>,
    /// Seat capacity (always positive).
    pub max_seats: u32,
    /// Seats consumed by registrations.
    pub current_registrations: u32,
    /// Lifecycle status.
    pub status: WorkshopStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Workshop {
    /// Whether a new registration may be accepted right now.
    #[must_use]
    pub const fn can_accept_registration(&self) -> bool {
        matches!(self.status, WorkshopStatus::Active) && self.current_registrations < self.max_seats
    }

    /// Seats still free (zero when over-subscribed by manual edits).
    #[must_use]
    pub const fn seats_remaining(&self) -> u32 {
        self.max_seats.saturating_sub(self.current_registrations)
    }

    /// Trimmed CNE/CPD prefix, if one is set and non-blank.
    #[must_use]
    pub fn form_prefix(&self) -> Option<&str> {
        self.cne_cpd_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Consume one seat only if the workshop can accept it.
    ///
    /// Returns `false` and leaves the record untouched when the workshop is
    /// not active or already at capacity.
    pub fn try_claim_seat(&mut self, now: DateTime<Utc>) -> bool {
        if !self.can_accept_registration() {
            return false;
        }
        self.record_seat(now);
        true
    }

    /// Consume one seat unconditionally, flipping `active` to `full` at capacity.
    pub fn record_seat(&mut self, now: DateTime<Utc>) {
        self.current_registrations = self.current_registrations.saturating_add(1);
        self.status = status_after_count_change(self.status, self.current_registrations, self.max_seats);
        self.updated_at = now;
    }

    /// Free one seat (floored at zero), flipping `full` back to `active`.
    pub fn release_seat(&mut self, now: DateTime<Utc>) {
        self.current_registrations = self.current_registrations.saturating_sub(1);
        self.status = status_after_count_change(self.status, self.current_registrations, self.max_seats);
        self.updated_at = now;
    }

    /// Overwrite the seat counter with a recounted value and report the change.
    pub fn reconcile(&mut self, counted: u32, now: DateTime<Utc>) -> ReconcileReport {
        let before = self.current_registrations;
        let status_before = self.status;
        self.current_registrations = counted;
        self.status = status_after_count_change(self.status, counted, self.max_seats);
        if before != counted || status_before != self.status {
            self.updated_at = now;
        }
        ReconcileReport {
            workshop_id: self.id,
            title: self.title.clone(),
            before,
            after: counted,
            status_before,
            status_after: self.status,
        }
    }

    /// Change capacity, re-applying the `active`/`full` rule.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] for zero or for fewer seats than
    /// current registrations; the record is left untouched.
    pub fn change_max_seats(&mut self, max_seats: u32, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if max_seats == 0 {
            return Err(LedgerError::InvalidInput(
                "max_seats must be greater than zero".into(),
            ));
        }
        if max_seats < self.current_registrations {
            return Err(LedgerError::InvalidInput(format!(
                "cannot reduce max_seats to {max_seats}: {} registrations already exist",
                self.current_registrations
            )));
        }
        self.max_seats = max_seats;
        self.status = status_after_count_change(self.status, self.current_registrations, max_seats);
        self.updated_at = now;
        Ok(())
    }

    /// The rejection a claim against this workshop in its current state produces.
    #[must_use]
    pub const fn capacity_exceeded(&self) -> LedgerError {
        LedgerError::CapacityExceeded {
            workshop_id: self.id,
            max_seats: self.max_seats,
            current_registrations: self.current_registrations,
            status: self.status,
        }
    }
}

/// The status a workshop ends up in after its seat count changed.
///
/// `active` becomes `full` once `count >= max_seats`; `full` becomes `active`
/// once `count < max_seats`. Every other status is returned unchanged.
#[must_use]
pub const fn status_after_count_change(
    status: WorkshopStatus,
    count: u32,
    max_seats: u32,
) -> WorkshopStatus {
    match status {
        WorkshopStatus::Active if count >= max_seats => WorkshopStatus::Full,
        WorkshopStatus::Full if count < max_seats => WorkshopStatus::Active,
        other => other,
    }
}

/// Input for creating a workshop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkshop {
    /// Display title.
    pub title: String,
    /// CNE/CPD number used as form-number prefix.
    pub cne_cpd_number: Option<String>,
    /// Seat capacity.
    pub max_seats: u32,
    /// Initial status (`draft` when absent).
    pub status: Option<WorkshopStatus>,
}

// ============================================================================
// Form numbers
// ============================================================================

/// Zero-padding width of the sequence part of a form number.
pub const FORM_NUMBER_WIDTH: usize = 4;

/// Prefix used when a workshop has no CNE/CPD number.
pub const DEFAULT_FORM_PREFIX: &str = "REG";

/// Externally visible registration number, `<prefix>-<zero-padded sequence>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormNumber(String);

impl FormNumber {
    /// Format a form number from its prefix and sequence.
    ///
    /// ```
    /// use workshop_ledger_core::types::FormNumber;
    ///
    /// assert_eq!(FormNumber::format("CPD", 1).as_str(), "CPD-0001");
    /// assert_eq!(FormNumber::format("1001", 12345).as_str(), "1001-12345");
    /// ```
    #[must_use]
    pub fn format(prefix: &str, sequence: u64) -> Self {
        Self(format!("{prefix}-{sequence:0width$}", width = FORM_NUMBER_WIDTH))
    }

    /// Wrap an already formatted value read back from storage.
    #[must_use]
    pub const fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    /// The form number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric sequence after the last `-`, if it parses.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0.rsplit_once('-').and_then(|(_, seq)| seq.parse().ok())
    }

    /// Everything before the last `-`.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.0.rsplit_once('-').map(|(prefix, _)| prefix)
    }
}

impl fmt::Display for FormNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Where a registration was entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationSource {
    /// Public registration form.
    Website,
    /// Entered by an executive on behalf of the attendee.
    Executive,
    /// Entered by an agent.
    Agent,
    /// Imported from a spreadsheet by an administrator.
    BulkUpload,
}

impl RegistrationSource {
    /// Convert source to its persisted string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Executive => "executive",
            Self::Agent => "agent",
            Self::BulkUpload => "bulk_upload",
        }
    }
}

impl FromStr for RegistrationSource {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(Self::Website),
            "executive" => Ok(Self::Executive),
            "agent" => Ok(Self::Agent),
            "bulk_upload" => Ok(Self::BulkUpload),
            other => Err(LedgerError::CorruptRecord(format!(
                "unknown registration source: {other}"
            ))),
        }
    }
}

/// The person a registration is for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Full name.
    pub full_name: String,
    /// Nursing council unique id; one registration per workshop.
    pub mnc_uid: String,
    /// Mobile number.
    pub mobile_number: String,
}

impl Attendee {
    /// Build an attendee, trimming every field.
    #[must_use]
    pub fn new(full_name: &str, mnc_uid: &str, mobile_number: &str) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            mnc_uid: mnc_uid.trim().to_string(),
            mobile_number: mobile_number.trim().to_string(),
        }
    }

    /// Trimmed copy, rejecting any blank field.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] naming every missing field.
    pub fn normalized(&self) -> Result<Self, LedgerError> {
        let attendee = Self::new(&self.full_name, &self.mnc_uid, &self.mobile_number);
        let missing: Vec<&str> = [
            ("full_name", &attendee.full_name),
            ("mnc_uid", &attendee.mnc_uid),
            ("mobile_number", &attendee.mobile_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(attendee)
        } else {
            Err(LedgerError::InvalidInput(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// A persisted registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration identifier.
    pub id: RegistrationId,
    /// Owning workshop.
    pub workshop_id: WorkshopId,
    /// Form number, immutable once issued.
    pub form_number: FormNumber,
    /// Who is registered.
    pub attendee: Attendee,
    /// Entry channel.
    pub source: RegistrationSource,
    /// Staff username for non-website entries.
    pub submitted_by: Option<String>,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

/// A request to register an attendee for a workshop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Target workshop.
    pub workshop_id: WorkshopId,
    /// Who is registering.
    pub attendee: Attendee,
    /// Entry channel.
    pub source: RegistrationSource,
    /// Staff username for non-website entries.
    pub submitted_by: Option<String>,
}

impl RegistrationRequest {
    /// A self-service website registration.
    #[must_use]
    pub const fn website(workshop_id: WorkshopId, attendee: Attendee) -> Self {
        Self {
            workshop_id,
            attendee,
            source: RegistrationSource::Website,
            submitted_by: None,
        }
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Outcome of recounting one workshop's registrations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Reconciled workshop.
    pub workshop_id: WorkshopId,
    /// Workshop title, for operator output.
    pub title: String,
    /// Stored counter before reconciliation.
    pub before: u32,
    /// Counted registrations, now stored.
    pub after: u32,
    /// Status before reconciliation.
    pub status_before: WorkshopStatus,
    /// Status after reconciliation.
    pub status_after: WorkshopStatus,
}

impl ReconcileReport {
    /// Whether the stored counter had drifted from the registration rows.
    #[must_use]
    pub const fn drifted(&self) -> bool {
        self.before != self.after
    }
}
