//! Lab technician repository (`laboratoristas`).

use serde::Deserialize;
use serde_json::json;

use dentalab_core::{Technician, TechnicianId, TechnicianInput, UserId};

use super::{RepositoryError, first_row, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "laboratoristas";

#[derive(Debug, Deserialize)]
struct TechnicianRow {
    id: TechnicianId,
    user_id: UserId,
    nombre: String,
    #[serde(default)]
    especialidad: Option<String>,
    #[serde(default)]
    activo: Option<bool>,
}

impl TryFrom<TechnicianRow> for Technician {
    type Error = RepositoryError;

    fn try_from(row: TechnicianRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: row.user_id,
            name: row.nombre,
            specialty: row.especialidad.unwrap_or_default(),
            active: row.activo.unwrap_or(true),
        })
    }
}

/// Repository for the current user's technicians.
pub struct TechnicianRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> TechnicianRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// All technicians owned by the user, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list(&self) -> Result<Vec<Technician>, RepositoryError> {
        let query = Query::table(TABLE)
            .owned_by(self.owner)
            .order_by("nombre", true);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<TechnicianRow, Technician>(rows))
    }

    /// Create a technician.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn create(&self, input: &TechnicianInput) -> Result<Technician, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "nombre": input.name,
                    "especialidad": input.specialty,
                    "activo": input.active,
                    "user_id": self.owner,
                }),
            )
            .await?;
        parse_row::<TechnicianRow, Technician>(row)
    }

    /// Update a technician.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned technician has this ID.
    pub async fn update(
        &self,
        id: TechnicianId,
        input: &TechnicianInput,
    ) -> Result<Technician, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({
                    "nombre": input.name,
                    "especialidad": input.specialty,
                    "activo": input.active,
                    "user_id": self.owner,
                }),
            )
            .await?;
        first_row::<TechnicianRow, Technician>(rows)
    }

    /// Delete a technician.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned technician has this ID.
    pub async fn delete(&self, id: TechnicianId) -> Result<Technician, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<TechnicianRow, Technician>(rows)
    }
}
