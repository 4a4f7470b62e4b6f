//! Row decoding.

use crate::error::storage_error;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::types::{
    Attendee, FormNumber, Registration, RegistrationId, Workshop, WorkshopId,
};

pub(crate) const WORKSHOP_COLUMNS: &str =
    "id, title, cne_cpd_number, max_seats, current_registrations, status, created_at, updated_at";

pub(crate) const REGISTRATION_COLUMNS: &str = "id, workshop_id, form_number, full_name, mnc_uid, \
     mobile_number, source, submitted_by, submitted_at";

fn non_negative(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| LedgerError::CorruptRecord(format!("{column} is negative: {value}")))
}

pub(crate) fn workshop(row: &PgRow) -> Result<Workshop> {
    let decode = |e: sqlx::Error| storage_error("decode workshop", e);
    let status: String = row.try_get("status").map_err(decode)?;

    Ok(Workshop {
        id: WorkshopId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        cne_cpd_number: row.try_get("cne_cpd_number").map_err(decode)?,
        max_seats: non_negative("max_seats", row.try_get("max_seats").map_err(decode)?)?,
        current_registrations: non_negative(
            "current_registrations",
            row.try_get("current_registrations").map_err(decode)?,
        )?,
        status: status.parse()?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn registration(row: &PgRow) -> Result<Registration> {
    let decode = |e: sqlx::Error| storage_error("decode registration", e);
    let source: String = row.try_get("source").map_err(decode)?;

    Ok(Registration {
        id: RegistrationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        workshop_id: WorkshopId::from_uuid(row.try_get::<Uuid, _>("workshop_id").map_err(decode)?),
        form_number: FormNumber::from_raw(row.try_get("form_number").map_err(decode)?),
        attendee: Attendee {
            full_name: row.try_get("full_name").map_err(decode)?,
            mnc_uid: row.try_get("mnc_uid").map_err(decode)?,
            mobile_number: row.try_get("mobile_number").map_err(decode)?,
        },
        source: source.parse()?,
        submitted_by: row.try_get("submitted_by").map_err(decode)?,
        submitted_at: row.try_get("submitted_at").map_err(decode)?,
    })
}

/// Convert a seat count for binding to an `INTEGER` column.
pub(crate) fn seats_param(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| LedgerError::InvalidInput(format!("seat count too large: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_counts_are_corrupt() {
        assert_eq!(non_negative("max_seats", 3).ok(), Some(3));
        assert!(matches!(
            non_negative("max_seats", -1),
            Err(LedgerError::CorruptRecord(_))
        ));
    }

    #[test]
    fn oversized_seat_count_is_rejected() {
        assert!(seats_param(u32::MAX).is_err());
        assert_eq!(seats_param(500).ok(), Some(500));
    }
}
