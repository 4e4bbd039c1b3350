//! The work-order board: orders plus the reference data needed to compose
//! and display them.
//!
//! Every mutation calls the store first and only then patches the local
//! board with the record the store returned. A failed call leaves the board
//! as it was.

use chrono::NaiveDate;
use thiserror::Error;

use dentalab_core::{
    Cart, ClinicDirectory, ClinicId, LocalList, OrderDraft, OrderEdit, OrderError, OrderFilter,
    Service, StatusCounts, Technician, WorkOrder, WorkOrderId, WorkOrderStatus,
    finalize_candidates,
};

use super::{Notices, loaded};
use crate::db::{
    ClinicRepository, DentistRepository, RepositoryError, ServiceRepository, TechnicianRepository,
    WorkOrderRepository,
};
use crate::models::CurrentUser;
use crate::store::DataStore;

/// Errors from board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Local validation rejected the request; nothing was sent.
    #[error(transparent)]
    Invalid(#[from] OrderError),

    /// The store call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The order is not on the board.
    #[error("work order {0} is not loaded")]
    UnknownOrder(WorkOrderId),
}

impl BoardError {
    /// Text shown to the user in a notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(e) => e.to_string(),
            Self::Repository(e) => e.user_message(),
            Self::UnknownOrder(_) => {
                "That work order no longer exists. Reload the page.".to_string()
            }
        }
    }
}

/// Loaded work-order screen state.
#[derive(Debug, Clone, Default)]
pub struct WorkOrderBoard {
    pub orders: LocalList<WorkOrder>,
    pub directory: ClinicDirectory,
    pub services: Vec<Service>,
    pub technicians: Vec<Technician>,
}

impl WorkOrderBoard {
    /// Load orders, clinics, dentists, services and technicians concurrently.
    ///
    /// A slice that fails to load is left empty with a warning notice.
    pub async fn load(store: &dyn DataStore, user: &CurrentUser, notices: &mut Notices) -> Self {
        let (token, owner) = (&user.token, user.id());
        let orders = WorkOrderRepository::new(store, token, owner);
        let clinics = ClinicRepository::new(store, token, owner);
        let dentists = DentistRepository::new(store, token, owner);
        let services = ServiceRepository::new(store, token, owner);
        let technicians = TechnicianRepository::new(store, token, owner);

        let (orders, clinics, dentists, services, technicians) = tokio::join!(
            orders.list(),
            clinics.list(),
            dentists.list(),
            services.list(),
            technicians.list(),
        );

        Self {
            orders: LocalList::new(loaded("Work orders", orders, notices)),
            directory: ClinicDirectory::new(
                loaded("Clinics", clinics, notices),
                loaded("Dentists", dentists, notices),
            ),
            services: loaded("Services", services, notices),
            technicians: loaded("Technicians", technicians, notices),
        }
    }

    /// Orders matching a board filter, in display order.
    pub fn filtered<'a>(&'a self, filter: &'a OrderFilter) -> impl Iterator<Item = &'a WorkOrder> {
        self.orders.iter().filter(move |o| filter.matches(o))
    }

    /// Per-status counts over every loaded order.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.orders)
    }

    #[must_use]
    pub fn service(&self, id: dentalab_core::ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    fn order(&self, id: WorkOrderId) -> Result<&WorkOrder, BoardError> {
        self.orders.get(id).ok_or(BoardError::UnknownOrder(id))
    }

    /// Save a new order from the draft header and the cart.
    ///
    /// Validation happens before any remote call: an empty cart, a missing
    /// clinic, dentist or patient, or a dentist known to work elsewhere is
    /// rejected locally. On success the order is prepended to the board.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Invalid` for rejected input, or the store error.
    pub async fn create(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        draft: OrderDraft,
        cart: &Cart,
        today: NaiveDate,
    ) -> Result<WorkOrderId, BoardError> {
        let order = draft.submit(cart, today)?;
        if self.directory.dentists.get(order.dentist_id).is_some()
            && !self
                .directory
                .dentist_works_at(order.dentist_id, order.clinic_id)
        {
            return Err(OrderError::DentistNotAtClinic.into());
        }

        let created = repo.create(&order).await?;
        let id = created.id;
        tracing::info!(order_id = %id, total = %created.total, "Work order created");
        self.orders.prepend(created);
        Ok(id)
    }

    /// Set one order's status. Any status may follow any other.
    ///
    /// # Errors
    ///
    /// Returns the store error; the board is unchanged then.
    pub async fn set_status(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        id: WorkOrderId,
        status: WorkOrderStatus,
    ) -> Result<(), BoardError> {
        let updated = repo.set_status(id, status).await?;
        tracing::info!(order_id = %id, status = %status, "Work order status changed");
        self.orders.replace(updated);
        Ok(())
    }

    /// Orders of `clinic` that are still pending or in production.
    #[must_use]
    pub fn finalize_candidates(&self, clinic: ClinicId) -> Vec<WorkOrderId> {
        finalize_candidates(self.orders.items(), clinic)
    }

    /// Move every open order of `clinic` to `finished` in one remote update.
    ///
    /// Returns how many orders changed. With no open orders, no remote call
    /// is made and zero is returned.
    ///
    /// # Errors
    ///
    /// Returns the store error; the board is unchanged then.
    pub async fn finalize(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        clinic: ClinicId,
    ) -> Result<usize, BoardError> {
        let ids = self.finalize_candidates(clinic);
        if ids.is_empty() {
            return Ok(0);
        }

        let updated = repo.set_status_many(&ids, WorkOrderStatus::Finished).await?;
        let count = updated.len();
        for order in updated {
            self.orders.replace(order);
        }
        tracing::info!(clinic_id = %clinic, count, "Finalized open work orders");
        Ok(count)
    }

    /// Amend patient, notes, delivery estimate and status together.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Invalid` for a blank patient or a delivery date
    /// before the creation date, or the store error.
    pub async fn edit(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        id: WorkOrderId,
        edit: OrderEdit,
    ) -> Result<(), BoardError> {
        let created_on = self.order(id)?.created_on;
        let edit = edit.validate()?;
        if edit.estimated_delivery < created_on {
            return Err(OrderError::DeliveryBeforeCreation.into());
        }

        let updated = repo.update(id, &edit).await?;
        self.orders.replace(updated);
        Ok(())
    }

    /// Remove one line and persist the recomputed total.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Invalid` for an index past the last line, or the
    /// store error.
    pub async fn remove_line(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        id: WorkOrderId,
        index: usize,
    ) -> Result<(), BoardError> {
        let update = self.order(id)?.without_line(index)?;
        let updated = repo.update_lines(id, &update).await?;
        tracing::info!(order_id = %id, index, total = %updated.total, "Removed work order line");
        self.orders.replace(updated);
        Ok(())
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns the store error; the board is unchanged then.
    pub async fn delete(
        &mut self,
        repo: &WorkOrderRepository<'_>,
        id: WorkOrderId,
    ) -> Result<WorkOrder, BoardError> {
        let deleted = repo.delete(id).await?;
        self.orders.remove(id);
        tracing::info!(order_id = %id, "Work order deleted");
        Ok(deleted)
    }
}
