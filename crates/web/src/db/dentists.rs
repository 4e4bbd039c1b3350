//! Dentist repository (`dentistas`).

use serde::Deserialize;
use serde_json::json;

use dentalab_core::{ClinicId, Dentist, DentistFields, DentistId, UserId};

use super::{RepositoryError, first_row, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "dentistas";

#[derive(Debug, Deserialize)]
struct DentistRow {
    id: DentistId,
    user_id: UserId,
    clinica_id: ClinicId,
    nombre: String,
    #[serde(default)]
    especialidad: Option<String>,
}

impl TryFrom<DentistRow> for Dentist {
    type Error = RepositoryError;

    fn try_from(row: DentistRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: row.user_id,
            clinic_id: row.clinica_id,
            name: row.nombre,
            specialty: row.especialidad.unwrap_or_default(),
        })
    }
}

/// Repository for the current user's dentists.
pub struct DentistRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> DentistRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// All dentists owned by the user, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list(&self) -> Result<Vec<Dentist>, RepositoryError> {
        let query = Query::table(TABLE)
            .owned_by(self.owner)
            .order_by("nombre", true);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<DentistRow, Dentist>(rows))
    }

    /// Create a dentist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn create(&self, fields: &DentistFields) -> Result<Dentist, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "nombre": fields.name,
                    "especialidad": fields.specialty,
                    "clinica_id": fields.clinic_id,
                    "user_id": self.owner,
                }),
            )
            .await?;
        parse_row::<DentistRow, Dentist>(row)
    }

    /// Update a dentist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned dentist has this ID.
    pub async fn update(&self, id: DentistId, fields: &DentistFields) -> Result<Dentist, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({
                    "nombre": fields.name,
                    "especialidad": fields.specialty,
                    "clinica_id": fields.clinic_id,
                    "user_id": self.owner,
                }),
            )
            .await?;
        first_row::<DentistRow, Dentist>(rows)
    }

    /// Delete a dentist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned dentist has this ID.
    pub async fn delete(&self, id: DentistId) -> Result<Dentist, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<DentistRow, Dentist>(rows)
    }

    /// Delete every dentist of a clinic, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails.
    pub async fn delete_for_clinic(&self, clinic: ClinicId) -> Result<usize, RepositoryError> {
        let query = Query::table(TABLE)
            .eq("clinica_id", clinic)
            .owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        Ok(rows.len())
    }
}
