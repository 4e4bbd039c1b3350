//! User profile repository (`usuarios`).
//!
//! Profiles are keyed by the auth-service user ID. Reads of a single profile
//! happen at sign-in; listing and mutation are back-office operations and
//! are not owner-scoped.

use serde::Deserialize;
use serde_json::json;

use dentalab_core::{UserId, UserProfile, UserRole};

use super::{RepositoryError, corrupt, first_row, parse_row, parse_rows, parse_timestamp};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "usuarios";

#[derive(Debug, Deserialize)]
struct UserRow {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    rol: Option<String>,
    #[serde(default)]
    nombre_laboratorio: Option<String>,
    #[serde(default)]
    activo: Option<bool>,
    #[serde(default)]
    fecha_registro: Option<String>,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = match row.rol.as_deref() {
            None | Some("") => UserRole::Client,
            Some(raw) => raw.parse().map_err(corrupt("rol"))?,
        };
        let registered_at = row
            .fecha_registro
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(Self {
            id: row.id,
            email: row.email.unwrap_or_default(),
            name: row.nombre.unwrap_or_default(),
            role,
            lab_name: row.nombre_laboratorio.unwrap_or_default(),
            active: row.activo.unwrap_or(true),
            registered_at,
        })
    }
}

/// Repository for user profiles.
pub struct UserRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken) -> Self {
        Self { store, token }
    }

    /// The profile of one user, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn get(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id);
        let rows = self.store.select(self.token, &query).await?;
        match first_row::<UserRow, UserProfile>(rows) {
            Ok(profile) => Ok(Some(profile)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every profile, newest registration first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list_all(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let query = Query::table(TABLE).order_by("fecha_registro", false);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<UserRow, UserProfile>(rows))
    }

    /// Create the profile row for a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn create(&self, profile: &UserProfile) -> Result<UserProfile, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "id": profile.id,
                    "email": profile.email,
                    "nombre": profile.name,
                    "rol": profile.role,
                    "nombre_laboratorio": profile.lab_name,
                    "activo": profile.active,
                    "fecha_registro": profile.registered_at.map(|t| t.to_rfc3339()),
                }),
            )
            .await?;
        parse_row::<UserRow, UserProfile>(row)
    }

    /// Activate or deactivate an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this ID.
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<UserProfile, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id);
        let rows = self
            .store
            .update(self.token, &query, json!({ "activo": active }))
            .await?;
        first_row::<UserRow, UserProfile>(rows)
    }

    /// Hard-delete a profile. The user's other records are left in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this ID.
    pub async fn delete(&self, id: UserId) -> Result<UserProfile, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<UserRow, UserProfile>(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_defaults_to_active_client() {
        let profile = parse_row::<UserRow, UserProfile>(json!({
            "id": UserId::generate().to_string(),
            "email": "lab@dentalworks.test",
        }))
        .unwrap();

        assert_eq!(profile.role, UserRole::Client);
        assert!(profile.active);
        assert!(profile.registered_at.is_none());
    }

    #[test]
    fn test_admin_row() {
        let profile = parse_row::<UserRow, UserProfile>(json!({
            "id": UserId::generate().to_string(),
            "email": "root@dentalworks.test",
            "rol": "admin",
            "activo": false,
            "fecha_registro": "2026-01-15T12:00:00Z",
        }))
        .unwrap();

        assert!(profile.is_admin());
        assert!(!profile.active);
        assert!(profile.registered_at.is_some());
    }
}
