//! Builders and sample data for ledger tests.

use crate::mocks::test_clock;
use workshop_ledger_core::environment::Clock;
use workshop_ledger_core::types::{
    Attendee, FormNumber, Registration, RegistrationId, RegistrationRequest, RegistrationSource,
    Workshop, WorkshopId, WorkshopStatus,
};

/// Builder for [`Workshop`] records.
///
/// Defaults to an `active` workshop titled "Test Workshop" with prefix `CPD`,
/// ten seats and no registrations, timestamped at [`test_clock`].
///
/// # Example
///
/// ```
/// use workshop_ledger_core::types::WorkshopStatus;
/// use workshop_ledger_testing::WorkshopBuilder;
///
/// let workshop = WorkshopBuilder::new().max_seats(2).build();
/// assert_eq!(workshop.status, WorkshopStatus::Active);
/// assert_eq!(workshop.form_prefix(), Some("CPD"));
/// ```
#[derive(Clone, Debug)]
pub struct WorkshopBuilder {
    workshop: Workshop,
}

impl WorkshopBuilder {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        let now = test_clock().now();
        Self {
            workshop: Workshop {
                id: WorkshopId::new(),
                title: "Test Workshop".to_string(),
                cne_cpd_number: Some("CPD".to_string()),
                max_seats: 10,
                current_registrations: 0,
                status: WorkshopStatus::Active,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.workshop.title = title.to_string();
        self
    }

    /// Set the CNE/CPD prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.workshop.cne_cpd_number = Some(prefix.to_string());
        self
    }

    /// Remove the CNE/CPD prefix.
    #[must_use]
    pub fn without_prefix(mut self) -> Self {
        self.workshop.cne_cpd_number = None;
        self
    }

    /// Set the capacity.
    #[must_use]
    pub const fn max_seats(mut self, max_seats: u32) -> Self {
        self.workshop.max_seats = max_seats;
        self
    }

    /// Set the stored registration counter.
    #[must_use]
    pub const fn current_registrations(mut self, count: u32) -> Self {
        self.workshop.current_registrations = count;
        self
    }

    /// Set the status.
    #[must_use]
    pub const fn status(mut self, status: WorkshopStatus) -> Self {
        self.workshop.status = status;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Workshop {
        self.workshop
    }
}

impl Default for WorkshopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The `n`th sample attendee; distinct `n` give distinct MNC UIDs.
#[must_use]
pub fn attendee(n: usize) -> Attendee {
    Attendee::new(
        &format!("Attendee {n}"),
        &format!("MNC-{n:05}"),
        &format!("98{n:08}"),
    )
}

/// A website registration request for the `n`th sample attendee.
#[must_use]
pub fn website_request(workshop_id: WorkshopId, n: usize) -> RegistrationRequest {
    RegistrationRequest::website(workshop_id, attendee(n))
}

/// A registration row with a fixed form number, for seeding stores directly.
#[must_use]
pub fn registration_for(workshop_id: WorkshopId, form_number: &str, attendee: Attendee) -> Registration {
    Registration {
        id: RegistrationId::new(),
        workshop_id,
        form_number: FormNumber::from_raw(form_number.to_string()),
        attendee,
        source: RegistrationSource::BulkUpload,
        submitted_by: Some("admin".to_string()),
        submitted_at: test_clock().now(),
    }
}
