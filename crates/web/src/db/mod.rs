//! Repositories over the hosted data store.
//!
//! One repository per table. Each call returns the authoritative record as
//! the store reports it after the mutation, so handlers patch local state
//! from what the store returned rather than from what they sent.
//!
//! Remote rows are untyped JSON. Each repository parses them through an
//! internal `Row` struct and a `TryFrom` conversion into the domain type.
//! A single row that does not parse is reported as
//! [`RepositoryError::DataCorruption`]; in a list, the unreadable row is
//! logged and skipped so the rest of the list still loads.
//!
//! Per-user repositories filter every call by `user_id = owner` and write
//! `user_id` on insert and update. Back-office repositories are not scoped.

pub mod clinics;
pub mod dentists;
pub mod lab_config;
pub mod memberships;
pub mod payments;
pub mod services;
pub mod technicians;
pub mod users;
pub mod work_orders;

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;

pub use clinics::ClinicRepository;
pub use dentists::DentistRepository;
pub use lab_config::LabConfigRepository;
pub use memberships::MembershipRepository;
pub use payments::PaymentRepository;
pub use services::ServiceRepository;
pub use technicians::TechnicianRepository;
pub use users::UserRepository;
pub use work_orders::WorkOrderRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The data store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A row returned by the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

impl RepositoryError {
    /// Text shown to the user in a notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(err) => err.user_message(),
            Self::DataCorruption(_) => {
                "Some stored data could not be read. Contact support if this continues.".to_string()
            }
            Self::NotFound => {
                "The record no longer exists or you do not have access to it.".to_string()
            }
        }
    }
}

/// Parse one row through its `Row` type.
pub(crate) fn parse_row<R, T>(row: Value) -> Result<T, RepositoryError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = RepositoryError>,
{
    let raw: R = serde_json::from_value(row)
        .map_err(|e| RepositoryError::DataCorruption(format!("unreadable row: {e}")))?;
    T::try_from(raw)
}

/// Parse every row through its `Row` type, skipping rows that do not parse.
pub(crate) fn parse_rows<R, T>(rows: Vec<Value>) -> Vec<T>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = RepositoryError>,
{
    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.get("id").map(ToString::to_string).unwrap_or_default();
        match parse_row::<R, T>(row) {
            Ok(item) => parsed.push(item),
            Err(e) => tracing::warn!(row_id = %id, error = %e, "Skipping unreadable row"),
        }
    }
    parsed
}

/// First row of a mutation result, or `NotFound` if nothing matched.
pub(crate) fn first_row<R, T>(rows: Vec<Value>) -> Result<T, RepositoryError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = RepositoryError>,
{
    let row = rows.into_iter().next().ok_or(RepositoryError::NotFound)?;
    parse_row::<R, T>(row)
}

/// Deserialize a money amount sent either as a JSON number or a string.
pub(crate) fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).map_err(serde::de::Error::custom)
}

/// Like [`de_decimal`] for nullable columns.
pub(crate) fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    decimal_from_value(&value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn decimal_from_value(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| format!("invalid amount {text}: {e}"))
        }
        Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|e| format!("invalid amount '{s}': {e}"))
        }
        other => Err(format!("expected an amount, got {other}")),
    }
}

/// Parse a date column stored either as `YYYY-MM-DD` or as a timestamp.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_timestamp(raw).map(|ts| ts.date_naive())
}

/// Parse a timestamp column, with or without an offset.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    Err(RepositoryError::DataCorruption(format!(
        "invalid timestamp '{raw}'"
    )))
}

/// Map an unparseable enum column to `DataCorruption`.
pub(crate) fn corrupt<E: std::fmt::Display>(column: &str) -> impl FnOnce(E) -> RepositoryError + '_ {
    move |e| RepositoryError::DataCorruption(format!("{column}: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct AmountRow {
        #[serde(deserialize_with = "de_decimal")]
        amount: Decimal,
    }

    #[test]
    fn test_decimal_from_number_or_string() {
        let a: AmountRow = serde_json::from_value(json!({"amount": 100})).unwrap();
        assert_eq!(a.amount, Decimal::new(100, 0));
        let b: AmountRow = serde_json::from_value(json!({"amount": "14.50"})).unwrap();
        assert_eq!(b.amount, Decimal::new(1450, 2));
        let c: AmountRow = serde_json::from_value(json!({"amount": 14.5})).unwrap();
        assert_eq!(c.amount, Decimal::new(145, 1));
        assert!(serde_json::from_value::<AmountRow>(json!({"amount": true})).is_err());
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert_eq!(parse_date("2026-03-04").unwrap(), expected);
        assert_eq!(parse_date("2026-03-04T10:15:00+00:00").unwrap(), expected);
        assert_eq!(parse_date("2026-03-04T10:15:00.123").unwrap(), expected);
        assert!(matches!(
            parse_date("04/03/2026"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_timestamp("2026-03-04T10:15:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-04T08:15:00+00:00");
    }

    #[test]
    fn test_unreadable_rows_are_skipped_in_lists() {
        struct Amount(Decimal);
        impl TryFrom<AmountRow> for Amount {
            type Error = RepositoryError;
            fn try_from(row: AmountRow) -> Result<Self, Self::Error> {
                Ok(Self(row.amount))
            }
        }

        let rows = vec![
            json!({"id": "a", "amount": "10"}),
            json!({"id": "b", "amount": "ten"}),
            json!({"id": "c"}),
            json!({"id": "d", "amount": 4}),
        ];
        let parsed = parse_rows::<AmountRow, Amount>(rows);
        let amounts: Vec<Decimal> = parsed.into_iter().map(|a| a.0).collect();
        assert_eq!(amounts, vec![Decimal::new(10, 0), Decimal::new(4, 0)]);

        let single = parse_row::<AmountRow, Amount>(json!({"id": "b", "amount": "ten"}));
        assert!(matches!(single, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_user_message_delegates_to_store() {
        let err = RepositoryError::Store(StoreError::PermissionDenied("rls".to_string()));
        assert_eq!(err.user_message(), crate::store::PERMISSION_DENIED_MESSAGE);
    }
}
