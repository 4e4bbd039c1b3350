//! REST implementation of [`DataStore`] for the hosted backend.
//!
//! # API Reference
//!
//! - Base URL: `{DATASTORE_URL}/rest/v1/{table}`
//! - Authentication: `apikey: <anon key>` plus `Authorization: Bearer <user token>`
//! - Filters: `column=eq.value`, `column=in.(a,b)`, `order=column.desc`
//! - Mutations send `Prefer: return=representation` so the stored rows come back
//! - Errors: `{"code", "message", "details", "hint"}`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{DataStore, Filter, PERMISSION_DENIED_CODE, Query, StoreError};
use crate::auth::AccessToken;
use crate::config::DataStoreConfig;

/// Path prefix of the table endpoints.
const REST_PATH: &str = "rest/v1/";

/// Error body returned by the REST interface.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// REST data-store client.
#[derive(Clone)]
pub struct RestDataStore {
    inner: Arc<RestDataStoreInner>,
}

struct RestDataStoreInner {
    client: reqwest::Client,
    base_url: Url,
}

impl RestDataStore {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value, the base
    /// URL cannot be extended, or the HTTP client fails to build.
    pub fn new(config: &DataStoreConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key.expose_secret())
                .map_err(|e| StoreError::InvalidRequest(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base_url = ensure_trailing_slash(&config.url)
            .join(REST_PATH)
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RestDataStoreInner { client, base_url }),
        })
    }

    /// Endpoint URL for a query, with filters and ordering in the query string.
    fn query_url(&self, query: &Query) -> Result<Url, StoreError> {
        let mut url = self.table_url(&query.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            for filter in &query.filters {
                match filter {
                    Filter::Eq(column, value) => {
                        pairs.append_pair(column, &format!("eq.{value}"));
                    }
                    Filter::In(column, values) => {
                        let list = values
                            .iter()
                            .map(|v| quote_list_value(v))
                            .collect::<Vec<_>>()
                            .join(",");
                        pairs.append_pair(column, &format!("in.({list})"));
                    }
                }
            }
            if let Some(order) = &query.order {
                let direction = if order.ascending { "asc" } else { "desc" };
                pairs.append_pair("order", &format!("{}.{direction}", order.column));
            }
        }
        Ok(url)
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::InvalidRequest(format!("invalid table name '{table}'")));
        }
        self.inner
            .base_url
            .join(table)
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, token: &AccessToken) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", token.expose()))
    }

    /// Handle API response and parse the returned rows.
    async fn handle_rows(&self, response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        let status = response.status();

        if status.is_success() {
            if status.as_u16() == 204 {
                return Ok(Vec::new());
            }
            let body: Value = response
                .json()
                .await
                .map_err(|e| StoreError::Parse(format!("Failed to parse response: {e}")))?;
            return match body {
                Value::Array(rows) => Ok(rows),
                Value::Object(_) => Ok(vec![body]),
                other => Err(StoreError::Parse(format!("expected rows, got {other}"))),
            };
        }

        Err(self.parse_error(response).await)
    }

    /// Parse an error response.
    async fn parse_error(&self, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        error_from_body(status, &text)
    }
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn select(&self, token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut url = self.query_url(query)?;
        url.query_pairs_mut().append_pair("select", "*");
        let response = self
            .authorized(self.inner.client.get(url), token)
            .send()
            .await?;
        self.handle_rows(response).await
    }

    async fn insert(&self, token: &AccessToken, table: &str, row: Value) -> Result<Value, StoreError> {
        let url = self.table_url(table)?;
        let response = self
            .authorized(self.inner.client.post(url), token)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        self.handle_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Parse(format!("insert into {table} returned no row")))
    }

    async fn update(
        &self,
        token: &AccessToken,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidRequest("refusing unfiltered update".to_string()));
        }
        let url = self.query_url(query)?;
        let response = self
            .authorized(self.inner.client.patch(url), token)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        self.handle_rows(response).await
    }

    async fn delete(&self, token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidRequest("refusing unfiltered delete".to_string()));
        }
        let url = self.query_url(query)?;
        let response = self
            .authorized(self.inner.client.delete(url), token)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        self.handle_rows(response).await
    }
}

impl std::fmt::Debug for RestDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataStore")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Map an error response to a [`StoreError`].
fn error_from_body(status: u16, text: &str) -> StoreError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                format!("request failed with status {status}")
            } else {
                text.trim().to_string()
            }
        });

    if body.code.as_deref() == Some(PERMISSION_DENIED_CODE) || status == 401 || status == 403 {
        return StoreError::PermissionDenied(message);
    }

    let message = match (&body.details, &body.hint) {
        (Some(details), _) if !details.trim().is_empty() => format!("{message} ({details})"),
        (_, Some(hint)) if !hint.trim().is_empty() => format!("{message} ({hint})"),
        _ => message,
    };

    StoreError::Api {
        status,
        code: body.code,
        message,
    }
}

/// Quote a value for an `in.(...)` list when it contains reserved characters.
fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn ensure_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use dentalab_core::UserId;

    use super::*;

    fn store(base: &str) -> RestDataStore {
        RestDataStore::new(&DataStoreConfig {
            url: Url::parse(base).unwrap(),
            anon_key: SecretString::from("anon-key-value"),
        })
        .unwrap()
    }

    #[test]
    fn test_query_url_encodes_filters_and_order() {
        let owner = UserId::generate();
        let query = Query::table("clinicas")
            .owned_by(owner)
            .order_by("created_at", false);

        let url = store("https://abc.backend.test").query_url(&query).unwrap();

        assert_eq!(url.path(), "/rest/v1/clinicas");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("user_id".to_string(), format!("eq.{owner}")),
                ("order".to_string(), "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_url_keeps_base_path() {
        let url = store("https://gateway.test/backend")
            .query_url(&Query::table("servicios").is_in("id", ["a", "b c"]))
            .unwrap();
        assert_eq!(url.path(), "/backend/rest/v1/servicios");
        let (_, value) = url.query_pairs().next().unwrap();
        assert_eq!(value, "in.(a,\"b c\")");
    }

    #[test]
    fn test_table_name_is_validated() {
        let store = store("https://abc.backend.test");
        assert!(store.table_url("ordenes_trabajo").is_ok());
        assert!(store.table_url("../auth").is_err());
        assert!(store.table_url("").is_err());
    }

    #[test]
    fn test_permission_denied_by_code() {
        let err = error_from_body(
            400,
            r#"{"code":"42501","message":"new row violates row-level security policy","details":null,"hint":null}"#,
        );
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_permission_denied_by_status() {
        assert!(error_from_body(401, "").is_permission_denied());
        assert!(error_from_body(403, r#"{"message":"forbidden"}"#).is_permission_denied());
    }

    #[test]
    fn test_api_error_includes_details() {
        let err = error_from_body(
            409,
            r#"{"code":"23505","message":"duplicate key","details":"Key (id) already exists.","hint":null}"#,
        );
        match err {
            StoreError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("23505"));
                assert_eq!(message, "duplicate key (Key (id) already exists.)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_error_body() {
        let err = error_from_body(502, "Bad Gateway");
        assert_eq!(err.user_message(), "Bad Gateway");
        let empty = error_from_body(500, "");
        assert_eq!(empty.user_message(), "request failed with status 500");
    }
}
