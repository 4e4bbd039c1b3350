//! Payment repository (`pagos`).

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use dentalab_core::{MembershipId, Payment, PaymentId, PaymentStatus, UserId};

use super::{RepositoryError, de_opt_decimal, parse_row, parse_rows, parse_timestamp};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "pagos";

#[derive(Debug, Deserialize)]
struct PaymentRow {
    id: PaymentId,
    #[serde(default)]
    referencia: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    monto: Option<Decimal>,
    #[serde(default)]
    moneda: Option<String>,
    #[serde(default)]
    metodo: Option<String>,
    #[serde(default)]
    estado: Option<PaymentStatus>,
    #[serde(default)]
    fecha: Option<String>,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    membresia_id: Option<MembershipId>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            reference: row.referencia.unwrap_or_default(),
            amount: row.monto.unwrap_or_default(),
            currency: row.moneda.unwrap_or_default(),
            method: row.metodo.unwrap_or_default(),
            status: row
                .estado
                .unwrap_or_else(|| PaymentStatus::Other(String::new())),
            paid_at: row.fecha.as_deref().map(parse_timestamp).transpose()?,
            user_id: row.user_id,
            membership_id: row.membresia_id,
        })
    }
}

/// A payment to insert.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub user_id: UserId,
    pub membership_id: Option<MembershipId>,
}

/// Repository for payments (back-office, not owner-scoped).
pub struct PaymentRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken) -> Self {
        Self { store, token }
    }

    /// Every payment, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list_all(&self) -> Result<Vec<Payment>, RepositoryError> {
        let query = Query::table(TABLE).order_by("fecha", false);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<PaymentRow, Payment>(rows))
    }

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or the row is invalid.
    pub async fn create(&self, payment: &NewPayment) -> Result<Payment, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "referencia": payment.reference,
                    "monto": payment.amount,
                    "moneda": payment.currency,
                    "metodo": payment.method,
                    "estado": payment.status,
                    "fecha": payment.paid_at.to_rfc3339(),
                    "user_id": payment.user_id,
                    "membresia_id": payment.membership_id,
                }),
            )
            .await?;
        parse_row::<PaymentRow, Payment>(row)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_with_numeric_amount() {
        let payment = parse_row::<PaymentRow, Payment>(json!({
            "id": PaymentId::generate().to_string(),
            "referencia": "PAY-7781",
            "monto": 29,
            "moneda": "USD",
            "metodo": "paypal",
            "estado": "completed",
            "fecha": "2026-02-02T10:00:00Z",
            "user_id": null,
        }))
        .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.amount, Decimal::new(29, 0));
        assert!(payment.user_id.is_none());
        assert!(payment.paid_at.is_some());
    }
}
