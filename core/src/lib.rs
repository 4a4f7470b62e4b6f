//! # Workshop Ledger Core
//!
//! Sequence issuing and seat-capacity tracking for workshop registrations.
//!
//! This crate owns the two pieces of the registration system that have to stay
//! correct under concurrent submission:
//!
//! - **Form numbers**: every registration gets a `<prefix>-<sequence>` number
//!   from a per-workshop counter. Numbers are unique, increase monotonically
//!   and are never reused, even after the registration is deleted.
//! - **Seats**: each workshop carries `current_registrations`, which must equal
//!   the number of its registration rows and never exceed `max_seats`. Filling
//!   the last seat turns an `active` workshop `full`; freeing one turns it back.
//!
//! ## Components
//!
//! - [`store`]: storage traits (counters, workshops, registrations)
//! - [`sequence::SequenceIssuer`]: issues form numbers
//! - [`capacity::CapacityTracker`]: claims, releases and reconciles seats
//! - [`ledger::RegistrationLedger`]: submission, batch and deletion flows
//! - [`catalog::WorkshopCatalog`]: administrative workshop changes
//!
//! Backends live in separate crates: `workshop-ledger-postgres`,
//! `workshop-ledger-local` (JSON files) and `workshop-ledger-testing`
//! (in memory).
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use workshop_ledger_core::prelude::*;
//!
//! let store = Arc::new(PostgresLedgerStore::connect(&config).await?);
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//!
//! let ledger = RegistrationLedger::new(Arc::clone(&store), Arc::clone(&clock));
//! let registration = ledger
//!     .submit(RegistrationRequest::website(workshop_id, attendee))
//!     .await?;
//! println!("registered as {}", registration.form_number);
//! ```

pub mod capacity;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod sequence;
pub mod store;
pub mod types;

pub use error::{LedgerError, Result};

/// Environment traits.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Commonly used types.
pub mod prelude {
    pub use crate::capacity::CapacityTracker;
    pub use crate::catalog::WorkshopCatalog;
    pub use crate::environment::{Clock, SystemClock};
    pub use crate::error::{LedgerError, Result};
    pub use crate::ledger::{BatchOutcome, BatchRow, RegistrationLedger};
    pub use crate::sequence::SequenceIssuer;
    pub use crate::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
    pub use crate::types::{
        Attendee, DEFAULT_FORM_PREFIX, FORM_NUMBER_WIDTH, FormNumber, NewWorkshop,
        ReconcileReport, Registration, RegistrationId, RegistrationRequest, RegistrationSource,
        Scope, Workshop, WorkshopId, WorkshopStatus,
    };
}
