//! Clinic repository (`clinicas`).

use serde::Deserialize;
use serde_json::json;

use dentalab_core::{Clinic, ClinicId, ClinicInput, UserId};

use super::{RepositoryError, first_row, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "clinicas";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ClinicRow {
    id: ClinicId,
    user_id: UserId,
    nombre: String,
    #[serde(default)]
    direccion: Option<String>,
    #[serde(default)]
    telefono: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TryFrom<ClinicRow> for Clinic {
    type Error = RepositoryError;

    fn try_from(row: ClinicRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: row.user_id,
            name: row.nombre,
            address: row.direccion.unwrap_or_default(),
            phone: row.telefono.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the current user's clinics.
pub struct ClinicRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> ClinicRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// All clinics owned by the user, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list(&self) -> Result<Vec<Clinic>, RepositoryError> {
        let query = Query::table(TABLE)
            .owned_by(self.owner)
            .order_by("nombre", true);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<ClinicRow, Clinic>(rows))
    }

    /// Create a clinic from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn create(&self, input: &ClinicInput) -> Result<Clinic, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "nombre": input.name,
                    "direccion": input.address,
                    "telefono": input.phone,
                    "email": input.email,
                    "user_id": self.owner,
                }),
            )
            .await?;
        parse_row::<ClinicRow, Clinic>(row)
    }

    /// Update a clinic.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned clinic has this ID.
    pub async fn update(&self, id: ClinicId, input: &ClinicInput) -> Result<Clinic, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({
                    "nombre": input.name,
                    "direccion": input.address,
                    "telefono": input.phone,
                    "email": input.email,
                    "user_id": self.owner,
                }),
            )
            .await?;
        first_row::<ClinicRow, Clinic>(rows)
    }

    /// Delete a clinic.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned clinic has this ID.
    pub async fn delete(&self, id: ClinicId) -> Result<Clinic, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<ClinicRow, Clinic>(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_with_null_optional_columns() {
        let owner = UserId::generate();
        let id = ClinicId::generate();
        let clinic: Clinic = parse_row::<ClinicRow, Clinic>(json!({
            "id": id.to_string(),
            "user_id": owner.to_string(),
            "nombre": "Smile Clinic",
            "direccion": null,
            "telefono": "555-0101",
            "created_at": "2026-01-01T00:00:00Z",
        }))
        .unwrap();

        assert_eq!(clinic.id, id);
        assert_eq!(clinic.owner, owner);
        assert_eq!(clinic.address, "");
        assert_eq!(clinic.phone, "555-0101");
    }

    #[test]
    fn test_row_with_bad_id_is_corruption() {
        let result = parse_row::<ClinicRow, Clinic>(json!({
            "id": 7,
            "user_id": UserId::generate().to_string(),
            "nombre": "Smile Clinic",
        }));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
