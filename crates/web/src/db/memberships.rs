//! Membership repository (`membresias`).

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use dentalab_core::{Membership, MembershipId, MembershipStatus, UserId};

use super::{RepositoryError, de_opt_decimal, parse_date, parse_row, parse_rows};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "membresias";

#[derive(Debug, Deserialize)]
struct MembershipRow {
    id: MembershipId,
    user_id: UserId,
    #[serde(default)]
    plan: Option<String>,
    fecha_inicio: String,
    fecha_fin: String,
    #[serde(default)]
    max_clinicas: Option<u32>,
    #[serde(default)]
    max_dentistas: Option<u32>,
    #[serde(default)]
    estado: Option<MembershipStatus>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    precio: Option<Decimal>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = RepositoryError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            plan: row.plan.unwrap_or_default(),
            starts_on: parse_date(&row.fecha_inicio)?,
            ends_on: parse_date(&row.fecha_fin)?,
            max_clinics: row.max_clinicas.unwrap_or_default(),
            max_dentists: row.max_dentistas.unwrap_or_default(),
            status: row
                .estado
                .unwrap_or_else(|| MembershipStatus::Other(String::new())),
            price: row.precio.unwrap_or_default(),
        })
    }
}

/// A membership to insert.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: UserId,
    pub plan: String,
    pub starts_on: chrono::NaiveDate,
    pub ends_on: chrono::NaiveDate,
    pub max_clinics: u32,
    pub max_dentists: u32,
    pub price: Decimal,
}

/// Repository for memberships (back-office, not owner-scoped).
pub struct MembershipRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
}

impl<'a> MembershipRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken) -> Self {
        Self { store, token }
    }

    /// Every membership, latest end date first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list_all(&self) -> Result<Vec<Membership>, RepositoryError> {
        let query = Query::table(TABLE).order_by("fecha_fin", false);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<MembershipRow, Membership>(rows))
    }

    /// Record an active membership.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn create(&self, membership: &NewMembership) -> Result<Membership, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "user_id": membership.user_id,
                    "plan": membership.plan,
                    "fecha_inicio": membership.starts_on.to_string(),
                    "fecha_fin": membership.ends_on.to_string(),
                    "max_clinicas": membership.max_clinics,
                    "max_dentistas": membership.max_dentists,
                    "estado": MembershipStatus::Active,
                    "precio": membership.price,
                }),
            )
            .await?;
        parse_row::<MembershipRow, Membership>(row)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_keeps_unknown_status() {
        let membership = parse_row::<MembershipRow, Membership>(json!({
            "id": MembershipId::generate().to_string(),
            "user_id": UserId::generate().to_string(),
            "plan": "professional",
            "fecha_inicio": "2026-01-01",
            "fecha_fin": "2026-01-31",
            "max_clinicas": 10,
            "max_dentistas": 50,
            "estado": "suspended",
            "precio": "59.00",
        }))
        .unwrap();

        assert_eq!(
            membership.status,
            MembershipStatus::Other("suspended".to_string())
        );
        assert_eq!(membership.max_clinics, 10);
        assert_eq!(membership.price, Decimal::new(5900, 2));
    }
}
