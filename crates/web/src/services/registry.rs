//! Clinic and dentist registry screens.
//!
//! Clinics and dentists are loaded together because every screen that shows
//! one needs the other: dentists are listed under their clinic, and deleting
//! a clinic removes its dentists.

use dentalab_core::{Clinic, ClinicDirectory, ClinicId};

use super::{Notices, loaded};
use crate::db::{ClinicRepository, DentistRepository, RepositoryError};
use crate::models::CurrentUser;
use crate::store::DataStore;

/// Clinics and dentists of the signed-in user.
#[derive(Debug, Clone)]
pub struct ClinicDirectoryScreen {
    pub directory: ClinicDirectory,
}

impl ClinicDirectoryScreen {
    /// Load clinics and dentists concurrently.
    pub async fn load(store: &dyn DataStore, user: &CurrentUser, notices: &mut Notices) -> Self {
        let clinics = ClinicRepository::new(store, &user.token, user.id());
        let dentists = DentistRepository::new(store, &user.token, user.id());

        let (clinic_rows, dentist_rows) = tokio::join!(clinics.list(), dentists.list());

        Self {
            directory: ClinicDirectory::new(
                loaded("Clinics", clinic_rows, notices),
                loaded("Dentists", dentist_rows, notices),
            ),
        }
    }

    /// Delete a clinic and its dentists.
    ///
    /// Dentists are deleted first, best-effort: a failure is logged and
    /// reported as a warning but does not stop the clinic deletion. Once the
    /// clinic is gone, every local dentist of that clinic is dropped too,
    /// whatever happened remotely to the dentists.
    ///
    /// # Errors
    ///
    /// Returns the clinic deletion error; local state is unchanged then.
    pub async fn delete_clinic(
        &mut self,
        store: &dyn DataStore,
        user: &CurrentUser,
        id: ClinicId,
        notices: &mut Notices,
    ) -> Result<Clinic, RepositoryError> {
        let dentists = DentistRepository::new(store, &user.token, user.id());
        match dentists.delete_for_clinic(id).await {
            Ok(count) => tracing::info!(clinic_id = %id, count, "Deleted dentists of clinic"),
            Err(e) => {
                tracing::warn!(error = %e, clinic_id = %id, "Failed to delete dentists of clinic");
                notices.warning(format!(
                    "The clinic's dentists could not be deleted: {}",
                    e.user_message()
                ));
            }
        }

        let clinics = ClinicRepository::new(store, &user.token, user.id());
        let clinic = clinics.delete(id).await?;
        let dropped = self.directory.remove_clinic(id);
        tracing::info!(
            clinic_id = %id,
            dropped_dentists = dropped.len(),
            "Clinic deleted"
        );
        Ok(clinic)
    }
}
