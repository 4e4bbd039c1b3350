//! Hosted data-store collaborator.
//!
//! The hosted backend exposes each table over a REST interface and enforces
//! row-level access policy itself. This module defines the narrow contract the
//! application relies on ([`DataStore`]) and the query shape it sends
//! ([`Query`]). Rows cross the boundary as untyped JSON; repositories in
//! [`crate::db`] parse them into domain types.
//!
//! # Tables
//!
//! - `usuarios` - Account profiles (role, lab name, active flag)
//! - `clinicas`, `dentistas`, `servicios`, `laboratoristas` - Registries
//! - `ordenes_trabajo` - Work orders with embedded line items
//! - `configuracion_laboratorio` - Letterhead and tax settings
//! - `membresias`, `pagos` - Subscriptions and payments

pub mod rest;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use dentalab_core::UserId;

use crate::auth::AccessToken;

pub use rest::RestDataStore;

/// Column holding the owning user on every per-user table.
pub const OWNER_COLUMN: &str = "user_id";

/// Postgres error code for an access-policy violation.
pub const PERMISSION_DENIED_CODE: &str = "42501";

/// Message shown when the access policy rejects a call.
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this \
    operation. Your session may have expired or your account may not have access to this \
    data. Sign out, sign in again and retry; if the problem continues, contact your \
    administrator to check your account's permissions.";

/// Errors returned by the data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access policy rejected the call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store returned an error response.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Text shown to the user in a notice.
    ///
    /// Store messages are shown verbatim; permission denials get the longer
    /// instructional message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied(_) => PERMISSION_DENIED_MESSAGE.to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::Http(_) => "Could not reach the data service. Check your connection and try again.".to_string(),
            Self::Parse(_) | Self::InvalidRequest(_) => "The data service returned an unexpected response.".to_string(),
        }
    }

    /// Whether this is an access-policy rejection.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// `column IN (values)`
    In(String, Vec<String>),
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: String,
    pub ascending: bool,
}

/// A table selection: equality and membership filters plus ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
}

impl Query {
    /// Select every row of `table` visible to the caller.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    /// Add a membership filter.
    #[must_use]
    pub fn is_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Restrict to rows owned by `owner`.
    #[must_use]
    pub fn owned_by(self, owner: UserId) -> Self {
        self.eq(OWNER_COLUMN, owner)
    }

    /// Order by `column`.
    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Ordering {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Whether a row satisfies every filter.
    ///
    /// Values are compared by their text form, the way the REST interface
    /// compares query-string values.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(column, value) => cell_text(row, column).as_deref() == Some(value.as_str()),
            Filter::In(column, values) => {
                cell_text(row, column).is_some_and(|cell| values.iter().any(|v| *v == cell))
            }
        })
    }
}

/// Text form of a row cell, `None` for missing or null cells.
#[must_use]
pub fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Remote table access.
///
/// Every call carries the caller's access token so the store can apply its
/// access policy. Per-user calls must include an explicit owner filter.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Insert one row, returning the stored row.
    async fn insert(&self, token: &AccessToken, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Apply `patch` to every row matching `query`, returning the updated rows.
    async fn update(
        &self,
        token: &AccessToken,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Delete every row matching `query`, returning the deleted rows.
    async fn delete(&self, token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_query_matches_text_form() {
        let owner = UserId::generate();
        let row = json!({
            "id": "a",
            "user_id": owner.to_string(),
            "activo": true,
            "precio_base": 100,
            "estado": "pending",
        });

        assert!(Query::table("servicios").owned_by(owner).matches(&row));
        assert!(Query::table("servicios").eq("activo", true).matches(&row));
        assert!(Query::table("servicios").eq("precio_base", 100).matches(&row));
        assert!(!Query::table("servicios").owned_by(UserId::generate()).matches(&row));
        assert!(
            Query::table("ordenes_trabajo")
                .is_in("estado", ["pending", "in-production"])
                .matches(&row)
        );
        assert!(!Query::table("x").eq("missing", "a").matches(&row));
    }

    #[test]
    fn test_permission_denied_message_is_instructional() {
        let err = StoreError::PermissionDenied("new row violates row-level security".to_string());
        assert!(err.is_permission_denied());
        assert_eq!(err.user_message(), PERMISSION_DENIED_MESSAGE);
        assert!(err.user_message().len() > 80);
    }

    #[test]
    fn test_api_error_surfaces_verbatim() {
        let err = StoreError::Api {
            status: 409,
            code: Some("23505".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "duplicate key value violates unique constraint"
        );
    }
}
