//! REST client for the hosted auth service.
//!
//! # API Reference
//!
//! - `POST {base}/auth/v1/token?grant_type=password` - sign in
//! - `POST {base}/auth/v1/token?grant_type=refresh_token` - renew an expired session
//! - `POST {base}/auth/v1/signup` - create account (with `data` metadata)
//! - `POST {base}/auth/v1/recover` - send recovery email
//! - `GET  {base}/auth/v1/user` - user for a bearer token
//! - `POST {base}/auth/v1/logout` - revoke a bearer token
//!
//! Every request carries the public `apikey` header.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use dentalab_core::UserId;

use super::{
    AccessToken, AuthError, AuthProvider, AuthSession, AuthUser, RefreshToken, SignUp,
    SignUpOutcome,
};
use crate::config::DataStoreConfig;

const AUTH_PATH: &str = "auth/v1/";

/// User object returned by the service.
#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    nombre_laboratorio: Option<String>,
}

/// Session object returned by sign-in and (auto-confirmed) sign-up.
#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: UserBody,
}

/// Sign-up returns either a session or, when confirmation is pending, a bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(SessionBody),
    User(UserBody),
}

/// Error body; the service uses several shapes across versions.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Auth service REST client.
#[derive(Clone)]
pub struct GoTrueAuth {
    inner: Arc<GoTrueAuthInner>,
}

struct GoTrueAuthInner {
    client: reqwest::Client,
    base_url: Url,
}

impl GoTrueAuth {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &DataStoreConfig) -> Result<Self, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key.expose_secret())
                .map_err(|e| AuthError::Parse(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let mut base_url = config.url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let base_url = base_url
            .join(AUTH_PATH)
            .map_err(|e| AuthError::Parse(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(GoTrueAuthInner { client, base_url }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| AuthError::Parse(e.to_string()))
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AuthError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AuthError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse an error response.
    async fn parse_error(&self, response: reqwest::Response) -> AuthError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        error_from_body(status, &text)
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let response = self
            .inner
            .client
            .post(url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: SessionBody = self.handle_response(response).await?;
        session_from_body(body, Utc::now())
    }

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, AuthError> {
        let url = self.endpoint("signup")?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": {
                    "nombre": request.name,
                    "nombre_laboratorio": request.lab_name,
                },
            }))
            .send()
            .await?;
        match self.handle_response::<SignUpBody>(response).await? {
            SignUpBody::Session(body) => {
                let session = session_from_body(body, Utc::now())?;
                Ok(SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpBody::User(body) => Ok(SignUpOutcome {
                user: user_from_body(body)?,
                session: None,
            }),
        }
    }

    async fn recover(&self, email: &str) -> Result<(), AuthError> {
        let url = self.endpoint("recover")?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.parse_error(response).await)
    }

    async fn refresh(&self, token: &RefreshToken) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let response = self
            .inner
            .client
            .post(url)
            .json(&json!({ "refresh_token": token.expose() }))
            .send()
            .await?;
        let body: SessionBody = self.handle_response(response).await?;
        session_from_body(body, Utc::now())
    }

    async fn get_user(&self, token: &AccessToken) -> Result<AuthUser, AuthError> {
        let url = self.endpoint("user")?;
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        let body: UserBody = self.handle_response(response).await?;
        user_from_body(body)
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), AuthError> {
        let url = self.endpoint("logout")?;
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.parse_error(response).await)
    }
}

impl std::fmt::Debug for GoTrueAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueAuth")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn user_from_body(body: UserBody) -> Result<AuthUser, AuthError> {
    let id: UserId = body
        .id
        .parse()
        .map_err(|e| AuthError::Parse(format!("invalid user id '{}': {e}", body.id)))?;
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    Ok(AuthUser {
        id,
        email: body.email.unwrap_or_default(),
        name: non_blank(body.user_metadata.nombre),
        lab_name: non_blank(body.user_metadata.nombre_laboratorio),
    })
}

fn session_from_body(body: SessionBody, now: DateTime<Utc>) -> Result<AuthSession, AuthError> {
    let expires_at = match (body.expires_at, body.expires_in) {
        (Some(at), _) => DateTime::from_timestamp(at, 0)
            .ok_or_else(|| AuthError::Parse(format!("invalid expires_at {at}")))?,
        (None, Some(secs)) => now + Duration::seconds(secs),
        (None, None) => now + Duration::hours(1),
    };
    Ok(AuthSession {
        access_token: AccessToken::new(body.access_token),
        expires_at,
        refresh_token: body
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new),
        user: user_from_body(body.user)?,
    })
}

/// Map an error response to an [`AuthError`].
fn error_from_body(status: u16, text: &str) -> AuthError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let code = body
        .error_code
        .as_deref()
        .or(body.error.as_deref())
        .unwrap_or_default();
    let message = body
        .msg
        .or(body.error_description)
        .or(body.message)
        .unwrap_or_else(|| text.trim().to_string());
    let lower = message.to_lowercase();

    if status == 429 || code == "over_request_rate_limit" {
        return AuthError::RateLimited;
    }
    if code.starts_with("refresh_token_") || lower.contains("refresh token") {
        return AuthError::SessionExpired;
    }
    if code == "invalid_credentials" || code == "invalid_grant" || lower.contains("invalid login credentials") {
        return AuthError::InvalidCredentials;
    }
    if code == "user_already_exists" || code == "email_exists" || lower.contains("already registered") {
        return AuthError::UserAlreadyExists;
    }
    if code == "weak_password" {
        return AuthError::WeakPassword(message);
    }
    if status == 401 || code == "bad_jwt" || code == "session_not_found" {
        return AuthError::SessionExpired;
    }

    AuthError::Api {
        status,
        message: if message.is_empty() {
            format!("request failed with status {status}")
        } else {
            message
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_from_body(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            error_from_body(422, r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            error_from_body(422, r#"{"error_code":"weak_password","msg":"Password should be at least 8 characters."}"#),
            AuthError::WeakPassword(_)
        ));
        assert!(matches!(error_from_body(429, ""), AuthError::RateLimited));
        assert!(matches!(
            error_from_body(400, r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Refresh Token Not Found"}"#),
            AuthError::SessionExpired
        ));
        assert!(matches!(
            error_from_body(400, r#"{"error_code":"refresh_token_already_used","msg":"Invalid Refresh Token: Already Used"}"#),
            AuthError::SessionExpired
        ));
        assert!(matches!(error_from_body(401, r#"{"msg":"invalid JWT"}"#), AuthError::SessionExpired));
        assert!(matches!(error_from_body(500, "boom"), AuthError::Api { status: 500, .. }));
    }

    #[test]
    fn test_session_from_body_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let body: SessionBody = serde_json::from_str(
            r#"{
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r",
                "user": {
                    "id": "7f0c1a4e-5b7b-4d4e-9f38-0d6c2f1a9b11",
                    "email": "lab@dentalworks.test",
                    "user_metadata": {"nombre": "Ana", "nombre_laboratorio": "Dental Works"}
                }
            }"#,
        )
        .unwrap();

        let session = session_from_body(body, now).unwrap();

        assert_eq!(session.expires_at, now + Duration::hours(1));
        assert_eq!(session.user.email, "lab@dentalworks.test");
        assert_eq!(session.user.lab_name.as_deref(), Some("Dental Works"));
        assert_eq!(session.access_token.expose(), "tok");
        assert_eq!(session.refresh_token.as_ref().map(RefreshToken::expose), Some("r"));
    }

    #[test]
    fn test_session_without_refresh_token() {
        let body: SessionBody = serde_json::from_str(
            r#"{
                "access_token": "tok",
                "expires_at": 1777636800,
                "refresh_token": "",
                "user": {"id": "7f0c1a4e-5b7b-4d4e-9f38-0d6c2f1a9b11"}
            }"#,
        )
        .unwrap();

        let session = session_from_body(body, Utc::now()).unwrap();

        assert!(session.refresh_token.is_none());
        assert_eq!(session.expires_at.timestamp(), 1_777_636_800);
    }

    #[test]
    fn test_sign_up_body_without_session() {
        let body: SignUpBody = serde_json::from_str(
            r#"{"id": "7f0c1a4e-5b7b-4d4e-9f38-0d6c2f1a9b11", "email": "new@lab.test", "user_metadata": {}}"#,
        )
        .unwrap();
        assert!(matches!(body, SignUpBody::User(_)));
    }

    #[test]
    fn test_user_with_bad_id_is_rejected() {
        let body = UserBody {
            id: "not-a-uuid".to_string(),
            email: None,
            user_metadata: UserMetadata::default(),
        };
        assert!(matches!(user_from_body(body), Err(AuthError::Parse(_))));
    }
}
