//! Administrative workshop operations.

use crate::environment::Clock;
use crate::error::{LedgerError, Result};
use crate::store::WorkshopStore;
use crate::types::{NewWorkshop, Workshop, WorkshopId, WorkshopStatus};
use std::sync::Arc;

/// Creates workshops and applies administrative changes to them.
pub struct WorkshopCatalog<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for WorkshopCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: WorkshopStore> WorkshopCatalog<S> {
    /// Create a catalog over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a workshop with no registrations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank title or zero seats.
    #[tracing::instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create(&self, new: NewWorkshop) -> Result<Workshop> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(LedgerError::InvalidInput("title must not be empty".into()));
        }
        if new.max_seats == 0 {
            return Err(LedgerError::InvalidInput(
                "max_seats must be greater than zero".into(),
            ));
        }

        let now = self.clock.now();
        let workshop = Workshop {
            id: WorkshopId::new(),
            title: title.to_string(),
            cne_cpd_number: clean_prefix(new.cne_cpd_number),
            max_seats: new.max_seats,
            current_registrations: 0,
            status: new.status.unwrap_or(WorkshopStatus::Draft),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_workshop(&workshop).await?;

        tracing::info!(workshop_id = %workshop.id, status = %workshop.status, "Workshop created");
        Ok(workshop)
    }

    /// Set any status; only `active ⇄ full` is later changed automatically.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(&self, id: WorkshopId, status: WorkshopStatus) -> Result<Workshop> {
        let workshop = self.store.set_status(id, status, self.clock.now()).await?;
        tracing::info!(workshop_id = %id, %status, "Workshop status changed");
        Ok(workshop)
    }

    /// Change seat capacity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for zero or for fewer seats than current
    /// registrations, and `WorkshopNotFound` for an unknown workshop.
    #[tracing::instrument(skip(self))]
    pub async fn change_max_seats(&self, id: WorkshopId, max_seats: u32) -> Result<Workshop> {
        if max_seats == 0 {
            return Err(LedgerError::InvalidInput(
                "max_seats must be greater than zero".into(),
            ));
        }
        self.store.set_max_seats(id, max_seats, self.clock.now()).await
    }

    /// Replace the CNE/CPD number used as form-number prefix.
    ///
    /// Numbers already issued keep their old prefix.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    pub async fn change_prefix(&self, id: WorkshopId, prefix: Option<String>) -> Result<Workshop> {
        self.store
            .set_prefix(id, clean_prefix(prefix), self.clock.now())
            .await
    }

    /// Load a workshop.
    ///
    /// # Errors
    ///
    /// Returns `WorkshopNotFound` for an unknown workshop.
    pub async fn get(&self, id: WorkshopId) -> Result<Workshop> {
        self.store
            .get_workshop(id)
            .await?
            .ok_or(LedgerError::WorkshopNotFound(id))
    }

    /// Every workshop.
    ///
    /// # Errors
    ///
    /// Returns `TransientStorage` on storage failure.
    pub async fn list(&self) -> Result<Vec<Workshop>> {
        self.store.list_workshops().await
    }
}

fn clean_prefix(prefix: Option<String>) -> Option<String> {
    prefix
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}
