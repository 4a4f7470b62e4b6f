//! sqlx implementation of the ledger storage traits.

use crate::config::PostgresConfig;
use crate::error::{ATTENDEE_UNIQUE, FORM_NUMBER_UNIQUE, Failure, classify, storage_error};
use crate::rows::{self, REGISTRATION_COLUMNS, WORKSHOP_COLUMNS, seats_param};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::store::{CounterStore, LedgerStore, RegistrationStore, WorkshopStore};
use workshop_ledger_core::types::{
    FormNumber, ReconcileReport, Registration, RegistrationId, Scope, Workshop, WorkshopId,
    WorkshopStatus,
};

/// `PostgreSQL`-backed ledger store.
#[derive(Clone, Debug)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Open a connection pool and, if configured, run migrations.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` if the database is unreachable or a
    /// migration fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| storage_error("connect", e))?;

        let store = Self::from_pool(pool);
        if config.run_migrations {
            store.migrate().await?;
        }

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::TransientStorage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every connection; later calls fail with `TransientStorage`.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    async fn fetch_workshop(&self, id: WorkshopId) -> Result<Option<Workshop>> {
        let sql = format!("SELECT {WORKSHOP_COLUMNS} FROM workshops WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_workshop", e))?;
        row.as_ref().map(rows::workshop).transpose()
    }

    /// Run a seat `UPDATE .. RETURNING` that only touches an existing row.
    async fn update_workshop(
        &self,
        operation: &str,
        sql: &str,
        id: WorkshopId,
        now: DateTime<Utc>,
    ) -> Result<Option<Workshop>> {
        let row = sqlx::query(sql)
            .bind(id.as_uuid())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(operation, e))?;
        row.as_ref().map(rows::workshop).transpose()
    }
}

impl CounterStore for PostgresLedgerStore {
    async fn increment_and_get(&self, scope: &Scope) -> Result<u64> {
        let last: i64 = sqlx::query_scalar(
            r"
            INSERT INTO sequence_counters (scope, last_number, updated_at)
            VALUES ($1, 1, now())
            ON CONFLICT (scope) DO UPDATE
            SET last_number = sequence_counters.last_number + 1,
                updated_at = now()
            RETURNING last_number
            ",
        )
        .bind(scope.key())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("increment_and_get", e))?;

        u64::try_from(last)
            .map_err(|_| LedgerError::CorruptRecord(format!("negative counter for {scope}")))
    }

    async fn current_value(&self, scope: &Scope) -> Result<u64> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT last_number FROM sequence_counters WHERE scope = $1")
                .bind(scope.key())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage_error("current_value", e))?;

        u64::try_from(last.unwrap_or(0))
            .map_err(|_| LedgerError::CorruptRecord(format!("negative counter for {scope}")))
    }
}

impl WorkshopStore for PostgresLedgerStore {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO workshops (
                id, title, cne_cpd_number, max_seats, current_registrations,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(workshop.id.as_uuid())
        .bind(&workshop.title)
        .bind(workshop.cne_cpd_number.as_deref())
        .bind(seats_param(workshop.max_seats)?)
        .bind(seats_param(workshop.current_registrations)?)
        .bind(workshop.status.as_str())
        .bind(workshop.created_at)
        .bind(workshop.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match classify("insert_workshop", e) {
            Failure::Unique(_) => {
                LedgerError::InvalidInput(format!("workshop {} already exists", workshop.id))
            }
            Failure::ForeignKey(e) | Failure::Other(e) => e,
        })?;
        Ok(())
    }

    async fn get_workshop(&self, id: WorkshopId) -> Result<Option<Workshop>> {
        self.fetch_workshop(id).await
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        let sql = format!("SELECT {WORKSHOP_COLUMNS} FROM workshops ORDER BY created_at, id");
        let records = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_workshops", e))?;
        records.iter().map(rows::workshop).collect()
    }

    async fn set_status(
        &self,
        id: WorkshopId,
        status: WorkshopStatus,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        let sql = format!(
            "UPDATE workshops SET status = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {WORKSHOP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("set_status", e))?;
        row.as_ref()
            .map(rows::workshop)
            .transpose()?
            .ok_or(LedgerError::WorkshopNotFound(id))
    }

    async fn set_max_seats(
        &self,
        id: WorkshopId,
        max_seats: u32,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        if max_seats == 0 {
            return Err(LedgerError::InvalidInput(
                "max_seats must be greater than zero".into(),
            ));
        }
        let sql = format!(
            r"
            UPDATE workshops
            SET max_seats = $2,
                status = CASE
                    WHEN status = 'active' AND current_registrations >= $2 THEN 'full'
                    WHEN status = 'full' AND current_registrations < $2 THEN 'active'
                    ELSE status
                END,
                updated_at = $3
            WHERE id = $1 AND current_registrations <= $2
            RETURNING {WORKSHOP_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(seats_param(max_seats)?)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("set_max_seats", e))?;

        if let Some(row) = row {
            return rows::workshop(&row);
        }
        match self.fetch_workshop(id).await? {
            None => Err(LedgerError::WorkshopNotFound(id)),
            Some(current) => Err(LedgerError::InvalidInput(format!(
                "cannot reduce max_seats to {max_seats}: {} registrations already exist",
                current.current_registrations
            ))),
        }
    }

    async fn set_prefix(
        &self,
        id: WorkshopId,
        cne_cpd_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Workshop> {
        let sql = format!(
            "UPDATE workshops SET cne_cpd_number = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {WORKSHOP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(cne_cpd_number)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("set_prefix", e))?;
        row.as_ref()
            .map(rows::workshop)
            .transpose()?
            .ok_or(LedgerError::WorkshopNotFound(id))
    }

    async fn claim_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let sql = format!(
            r"
            UPDATE workshops
            SET current_registrations = current_registrations + 1,
                status = CASE
                    WHEN current_registrations + 1 >= max_seats THEN 'full'
                    ELSE status
                END,
                updated_at = $2
            WHERE id = $1
              AND status = 'active'
              AND current_registrations < max_seats
            RETURNING {WORKSHOP_COLUMNS}
            "
        );
        if let Some(workshop) = self.update_workshop("claim_seat", &sql, id, now).await? {
            return Ok(workshop);
        }

        // Zero rows: either the workshop is missing or it refused the seat.
        match self.fetch_workshop(id).await? {
            None => Err(LedgerError::WorkshopNotFound(id)),
            Some(current) => Err(current.capacity_exceeded()),
        }
    }

    async fn record_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let sql = format!(
            r"
            UPDATE workshops
            SET current_registrations = current_registrations + 1,
                status = CASE
                    WHEN status = 'active' AND current_registrations + 1 >= max_seats THEN 'full'
                    ELSE status
                END,
                updated_at = $2
            WHERE id = $1
            RETURNING {WORKSHOP_COLUMNS}
            "
        );
        self.update_workshop("record_seat", &sql, id, now)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(id))
    }

    async fn release_seat(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<Workshop> {
        let sql = format!(
            r"
            UPDATE workshops
            SET current_registrations = GREATEST(current_registrations - 1, 0),
                status = CASE
                    WHEN status = 'full' AND GREATEST(current_registrations - 1, 0) < max_seats
                        THEN 'active'
                    ELSE status
                END,
                updated_at = $2
            WHERE id = $1
            RETURNING {WORKSHOP_COLUMNS}
            "
        );
        self.update_workshop("release_seat", &sql, id, now)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(id))
    }
}

impl RegistrationStore for PostgresLedgerStore {
    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO registrations (
                id, workshop_id, form_number, full_name, mnc_uid, mobile_number,
                source, submitted_by, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(registration.id.as_uuid())
        .bind(registration.workshop_id.as_uuid())
        .bind(registration.form_number.as_str())
        .bind(&registration.attendee.full_name)
        .bind(&registration.attendee.mnc_uid)
        .bind(&registration.attendee.mobile_number)
        .bind(registration.source.as_str())
        .bind(registration.submitted_by.as_deref())
        .bind(registration.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match classify("insert_registration", e) {
            Failure::Unique(Some(constraint)) if constraint == ATTENDEE_UNIQUE => {
                LedgerError::DuplicateRegistration {
                    workshop_id: registration.workshop_id,
                    mnc_uid: registration.attendee.mnc_uid.clone(),
                }
            }
            Failure::Unique(Some(constraint)) if constraint == FORM_NUMBER_UNIQUE => {
                LedgerError::DuplicateFormNumber(registration.form_number.clone())
            }
            Failure::Unique(_) => LedgerError::InvalidInput(format!(
                "registration {} already exists",
                registration.id
            )),
            Failure::ForeignKey(_) => LedgerError::WorkshopNotFound(registration.workshop_id),
            Failure::Other(e) => e,
        })?;
        Ok(())
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("get_registration", e))?;
        row.as_ref().map(rows::registration).transpose()
    }

    async fn find_by_form_number(
        &self,
        workshop_id: WorkshopId,
        form_number: &FormNumber,
    ) -> Result<Option<Registration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE workshop_id = $1 AND form_number = $2"
        );
        let row = sqlx::query(&sql)
            .bind(workshop_id.as_uuid())
            .bind(form_number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("find_by_form_number", e))?;
        row.as_ref().map(rows::registration).transpose()
    }

    async fn find_by_attendee(
        &self,
        workshop_id: WorkshopId,
        mnc_uid: &str,
    ) -> Result<Option<Registration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE workshop_id = $1 AND mnc_uid = $2"
        );
        let row = sqlx::query(&sql)
            .bind(workshop_id.as_uuid())
            .bind(mnc_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("find_by_attendee", e))?;
        row.as_ref().map(rows::registration).transpose()
    }

    async fn list_by_workshop(&self, workshop_id: WorkshopId) -> Result<Vec<Registration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE workshop_id = $1 ORDER BY row_seq"
        );
        let records = sqlx::query(&sql)
            .bind(workshop_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_by_workshop", e))?;
        records.iter().map(rows::registration).collect()
    }

    async fn delete_registration(&self, id: RegistrationId) -> Result<Option<Registration>> {
        let sql = format!("DELETE FROM registrations WHERE id = $1 RETURNING {REGISTRATION_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("delete_registration", e))?;
        row.as_ref().map(rows::registration).transpose()
    }

    async fn count_by_workshop(&self, workshop_id: WorkshopId) -> Result<u32> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE workshop_id = $1")
                .bind(workshop_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_error("count_by_workshop", e))?;
        u32::try_from(count)
            .map_err(|_| LedgerError::CorruptRecord(format!("registration count out of range: {count}")))
    }
}

impl LedgerStore for PostgresLedgerStore {
    async fn reconcile_workshop(&self, id: WorkshopId, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("reconcile", e))?;

        // Row lock blocks seat updates and registration inserts (FK check)
        // for this workshop until commit.
        let sql = format!("SELECT {WORKSHOP_COLUMNS} FROM workshops WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage_error("reconcile", e))?;
        let Some(row) = row else {
            return Err(LedgerError::WorkshopNotFound(id));
        };
        let mut workshop = rows::workshop(&row)?;

        let counted: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE workshop_id = $1")
                .bind(id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| storage_error("reconcile", e))?;
        let counted = u32::try_from(counted)
            .map_err(|_| LedgerError::CorruptRecord(format!("registration count out of range: {counted}")))?;

        let report = workshop.reconcile(counted, now);
        if report.drifted() || report.status_before != report.status_after {
            sqlx::query(
                r"
                UPDATE workshops
                SET current_registrations = $2, status = $3, updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .bind(seats_param(workshop.current_registrations)?)
            .bind(workshop.status.as_str())
            .bind(workshop.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("reconcile", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage_error("reconcile", e))?;
        Ok(report)
    }
}
