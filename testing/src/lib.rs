//! # Workshop Ledger Testing
//!
//! Testing utilities for the workshop ledger.
//!
//! This crate provides:
//! - [`InMemoryLedgerStore`]: fast, deterministic implementation of every store trait
//! - [`FlakyStore`]: wrapper that injects transient storage failures
//! - [`FixedClock`] and [`test_clock`]: deterministic time
//! - [`WorkshopBuilder`], [`attendee`] and friends: fixtures
//! - [`properties`]: proptest strategies for ledger workloads
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use workshop_ledger_core::ledger::RegistrationLedger;
//! use workshop_ledger_core::store::WorkshopStore;
//! use workshop_ledger_testing::{InMemoryLedgerStore, WorkshopBuilder, test_clock, website_request};
//!
//! # async fn example() -> workshop_ledger_core::Result<()> {
//! let store = Arc::new(InMemoryLedgerStore::new());
//! let workshop = WorkshopBuilder::new().prefix("CPD").build();
//! store.insert_workshop(&workshop).await?;
//!
//! let ledger = RegistrationLedger::new(store, Arc::new(test_clock()));
//! let registration = ledger.submit(website_request(workshop.id, 1)).await?;
//! assert_eq!(registration.form_number.as_str(), "CPD-0001");
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use workshop_ledger_core::environment::Clock;

pub mod fixtures;
pub mod flaky;
pub mod memory;
pub mod properties;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use workshop_ledger_testing::mocks::FixedClock;
    /// use workshop_ledger_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics only if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::{WorkshopBuilder, attendee, registration_for, website_request};
pub use flaky::{FlakyStore, Operation};
pub use memory::InMemoryLedgerStore;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn sample_attendees_are_distinct() {
        assert_ne!(attendee(1).mnc_uid, attendee(2).mnc_uid);
        assert!(attendee(7).normalized().is_ok());
    }
}
