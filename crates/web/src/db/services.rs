//! Service catalogue repository (`servicios`).

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use dentalab_core::{Service, ServiceCategory, ServiceFields, ServiceId, UserId};

use super::{RepositoryError, corrupt, de_decimal, first_row, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "servicios";

#[derive(Debug, Deserialize)]
struct ServiceRow {
    id: ServiceId,
    user_id: UserId,
    nombre: String,
    #[serde(deserialize_with = "de_decimal")]
    precio_base: Decimal,
    #[serde(default)]
    categoria: Option<String>,
    #[serde(default = "default_true")]
    activo: bool,
}

const fn default_true() -> bool {
    true
}

impl TryFrom<ServiceRow> for Service {
    type Error = RepositoryError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let category = match row.categoria.as_deref() {
            None | Some("") => ServiceCategory::Other,
            Some(raw) => raw.parse().map_err(corrupt("categoria"))?,
        };
        Ok(Self {
            id: row.id,
            owner: row.user_id,
            name: row.nombre,
            base_price: row.precio_base,
            category,
            active: row.activo,
        })
    }
}

/// Repository for the current user's services.
pub struct ServiceRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> ServiceRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// All services owned by the user, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list(&self) -> Result<Vec<Service>, RepositoryError> {
        let query = Query::table(TABLE)
            .owned_by(self.owner)
            .order_by("nombre", true);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<ServiceRow, Service>(rows))
    }

    /// Create a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn create(&self, fields: &ServiceFields) -> Result<Service, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "nombre": fields.name,
                    "precio_base": fields.base_price,
                    "categoria": fields.category,
                    "activo": fields.active,
                    "user_id": self.owner,
                }),
            )
            .await?;
        parse_row::<ServiceRow, Service>(row)
    }

    /// Replace every editable field of a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned service has this ID.
    pub async fn update(&self, id: ServiceId, fields: &ServiceFields) -> Result<Service, RepositoryError> {
        self.patch(
            id,
            json!({
                "nombre": fields.name,
                "precio_base": fields.base_price,
                "categoria": fields.category,
                "activo": fields.active,
                "user_id": self.owner,
            }),
        )
        .await
    }

    /// Change only the base price (price-list screen).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned service has this ID.
    pub async fn set_price(&self, id: ServiceId, price: Decimal) -> Result<Service, RepositoryError> {
        self.patch(id, json!({ "precio_base": price, "user_id": self.owner }))
            .await
    }

    /// Toggle availability.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned service has this ID.
    pub async fn set_active(&self, id: ServiceId, active: bool) -> Result<Service, RepositoryError> {
        self.patch(id, json!({ "activo": active, "user_id": self.owner }))
            .await
    }

    /// Delete a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned service has this ID.
    pub async fn delete(&self, id: ServiceId) -> Result<Service, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<ServiceRow, Service>(rows)
    }

    async fn patch(&self, id: ServiceId, patch: serde_json::Value) -> Result<Service, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.update(self.token, &query, patch).await?;
        first_row::<ServiceRow, Service>(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(categoria: serde_json::Value) -> serde_json::Value {
        json!({
            "id": ServiceId::generate().to_string(),
            "user_id": UserId::generate().to_string(),
            "nombre": "Zirconia crown",
            "precio_base": "100.00",
            "categoria": categoria,
        })
    }

    #[test]
    fn test_row_defaults() {
        let service = parse_row::<ServiceRow, Service>(row(json!(null))).unwrap();
        assert_eq!(service.category, ServiceCategory::Other);
        assert!(service.active);
        assert_eq!(service.base_price, Decimal::new(100, 0));
    }

    #[test]
    fn test_unknown_category_is_corruption() {
        let result = parse_row::<ServiceRow, Service>(row(json!("crowns")));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
