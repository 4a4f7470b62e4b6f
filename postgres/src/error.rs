//! Mapping from sqlx errors to ledger errors.

use workshop_ledger_core::error::LedgerError;

/// Unique constraint on `(workshop_id, mnc_uid)`.
pub(crate) const ATTENDEE_UNIQUE: &str = "registrations_workshop_mnc_uid_key";
/// Unique constraint on `(workshop_id, form_number)`.
pub(crate) const FORM_NUMBER_UNIQUE: &str = "registrations_workshop_form_number_key";

/// What a failed statement ran into.
#[derive(Debug)]
pub(crate) enum Failure {
    /// Unique constraint violated; carries the constraint name.
    Unique(Option<String>),
    /// Referenced row does not exist; carries the plain storage mapping for
    /// statements where that cannot happen.
    ForeignKey(LedgerError),
    /// Anything else, already mapped.
    Other(LedgerError),
}

/// Classify a sqlx error for callers that care about constraint violations.
pub(crate) fn classify(operation: &str, e: sqlx::Error) -> Failure {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return Failure::Unique(db.constraint().map(ToString::to_string));
        }
        if db.is_foreign_key_violation() {
            return Failure::ForeignKey(storage_error(operation, e));
        }
    }
    Failure::Other(storage_error(operation, e))
}

/// Map a sqlx error to the ledger taxonomy.
///
/// Decode failures mean the stored data is unreadable and retrying will not
/// help; everything else is reported as transient.
pub(crate) fn storage_error(operation: &str, e: sqlx::Error) -> LedgerError {
    match e {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => {
            tracing::error!(operation, error = %e, "Failed to decode stored row");
            LedgerError::CorruptRecord(format!("{operation}: {e}"))
        }
        other => {
            tracing::warn!(operation, error = %other, "Storage operation failed");
            LedgerError::TransientStorage(format!("{operation}: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct Violation {
        foreign_key: bool,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violation of {:?}", self.constraint)
        }
    }

    impl StdError for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> ErrorKind {
            if self.foreign_key {
                ErrorKind::ForeignKeyViolation
            } else {
                ErrorKind::UniqueViolation
            }
        }
    }

    fn violation(foreign_key: bool, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation {
            foreign_key,
            constraint,
        }))
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = storage_error("claim_seat", sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("claim_seat"));
    }

    #[test]
    fn decode_failure_is_corrupt() {
        let err = storage_error("get_workshop", sqlx::Error::ColumnNotFound("status".into()));
        assert!(matches!(err, LedgerError::CorruptRecord(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn non_database_errors_are_classified_as_other() {
        assert!(matches!(
            classify("insert_registration", sqlx::Error::PoolClosed),
            Failure::Other(LedgerError::TransientStorage(_))
        ));
    }

    #[test]
    fn unique_violation_keeps_constraint_name() {
        let failure = classify(
            "insert_registration",
            violation(false, Some(ATTENDEE_UNIQUE)),
        );
        assert!(matches!(failure, Failure::Unique(Some(name)) if name == ATTENDEE_UNIQUE));
    }

    #[test]
    fn foreign_key_violation_still_carries_storage_error() {
        let failure = classify("insert_workshop", violation(true, None));
        let Failure::ForeignKey(err) = failure else {
            unreachable!("expected a foreign-key failure");
        };
        assert!(matches!(err, LedgerError::TransientStorage(_)));
        assert!(err.to_string().contains("insert_workshop"));
    }
}
