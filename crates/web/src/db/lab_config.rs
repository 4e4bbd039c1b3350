//! Lab configuration repository (`configuracion_laboratorio`).
//!
//! One row per user. Saving inserts when no prior row exists and updates the
//! known row otherwise.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use dentalab_core::{LabConfig, LabConfigFields, LabConfigId, TaxMode, TaxSettings, UserId};

use super::{RepositoryError, corrupt, de_opt_decimal, first_row, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "configuracion_laboratorio";

#[derive(Debug, Deserialize)]
struct LabConfigRow {
    id: LabConfigId,
    user_id: UserId,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    nit: Option<String>,
    #[serde(default)]
    direccion: Option<String>,
    #[serde(default)]
    telefono: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    tipo_impuesto: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    porcentaje_impuesto: Option<Decimal>,
}

impl TryFrom<LabConfigRow> for LabConfig {
    type Error = RepositoryError;

    fn try_from(row: LabConfigRow) -> Result<Self, Self::Error> {
        let mode = match row.tipo_impuesto.as_deref() {
            None | Some("") => TaxMode::default(),
            Some(raw) => raw.parse().map_err(corrupt("tipo_impuesto"))?,
        };
        let tax = TaxSettings {
            mode,
            percent: row
                .porcentaje_impuesto
                .unwrap_or_else(|| mode.default_percent()),
        };

        Ok(Self {
            id: row.id,
            owner: row.user_id,
            name: row.nombre.unwrap_or_default(),
            tax_id: row.nit.unwrap_or_default(),
            address: row.direccion.unwrap_or_default(),
            phone: row.telefono.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            logo: row.logo.filter(|l| !l.is_empty()),
            tax,
        })
    }
}

/// Repository for the current user's lab configuration.
pub struct LabConfigRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> LabConfigRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// The user's configuration, if one has been saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn get(&self) -> Result<Option<LabConfig>, RepositoryError> {
        let query = Query::table(TABLE).owned_by(self.owner);
        let rows = self.store.select(self.token, &query).await?;
        let mut configs = parse_rows::<LabConfigRow, LabConfig>(rows);
        if configs.len() > 1 {
            tracing::warn!(
                owner = %self.owner,
                count = configs.len(),
                "Multiple lab configurations stored, using the first"
            );
        }
        Ok((!configs.is_empty()).then(|| configs.swap_remove(0)))
    }

    /// Create or update the configuration.
    ///
    /// `existing` is the identifier of the previously loaded record; `logo`
    /// replaces the stored logo when present and leaves it untouched
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn save(
        &self,
        existing: Option<LabConfigId>,
        fields: &LabConfigFields,
        logo: Option<String>,
    ) -> Result<LabConfig, RepositoryError> {
        let mut row = Map::new();
        row.insert("nombre".into(), json!(fields.name));
        row.insert("nit".into(), json!(fields.tax_id));
        row.insert("direccion".into(), json!(fields.address));
        row.insert("telefono".into(), json!(fields.phone));
        row.insert("email".into(), json!(fields.email.as_str()));
        row.insert("tipo_impuesto".into(), json!(fields.tax.mode.as_str()));
        row.insert("porcentaje_impuesto".into(), json!(fields.tax.percent));
        row.insert("user_id".into(), json!(self.owner));
        if let Some(logo) = logo {
            row.insert("logo".into(), Value::String(logo));
        }

        match existing {
            Some(id) => {
                let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
                let rows = self
                    .store
                    .update(self.token, &query, Value::Object(row))
                    .await?;
                first_row::<LabConfigRow, LabConfig>(rows)
            }
            None => {
                let row = self
                    .store
                    .insert(self.token, TABLE, Value::Object(row))
                    .await?;
                parse_row::<LabConfigRow, LabConfig>(row)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_tax_columns_default_to_vat() {
        let config = parse_row::<LabConfigRow, LabConfig>(json!({
            "id": LabConfigId::generate().to_string(),
            "user_id": UserId::generate().to_string(),
            "nombre": "Dental Works",
            "logo": "",
        }))
        .unwrap();

        assert_eq!(config.tax.mode, TaxMode::Vat);
        assert_eq!(config.tax.percent, Decimal::new(19, 0));
        assert!(config.logo.is_none());
    }

    #[test]
    fn test_withholding_row_keeps_stored_percent() {
        let config = parse_row::<LabConfigRow, LabConfig>(json!({
            "id": LabConfigId::generate().to_string(),
            "user_id": UserId::generate().to_string(),
            "tipo_impuesto": "withholding",
            "porcentaje_impuesto": 11,
        }))
        .unwrap();

        assert_eq!(config.tax.mode, TaxMode::Withholding);
        assert_eq!(config.tax.percent, Decimal::new(11, 0));
    }
}
