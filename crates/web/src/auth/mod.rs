//! Authentication collaborator.
//!
//! Sign-in, sign-up, recovery and session issuance belong to the hosted
//! backend's auth service. This module defines the contract the application
//! uses ([`AuthProvider`]), a REST implementation ([`gotrue::GoTrueAuth`]) and
//! the application-level [`AuthContext`] that derives the user-facing profile
//! and broadcasts sign-in/sign-out events.

pub mod context;
mod error;
pub mod gotrue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dentalab_core::UserId;

pub use context::{AuthContext, AuthEvent};
pub use error::AuthError;
pub use gotrue::GoTrueAuth;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Bearer token issued by the auth service.
///
/// Implements `Debug` manually so tokens never reach the logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Long-lived token exchanged for a new access token once the old one expires.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken([REDACTED])")
    }
}

/// Identity as known to the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    /// Display name from sign-up metadata.
    pub name: Option<String>,
    /// Lab name from sign-up metadata.
    pub lab_name: Option<String>,
}

/// An issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
    /// Absent when the service did not issue one; such sessions end at `expires_at`.
    pub refresh_token: Option<RefreshToken>,
    pub user: AuthUser,
}

/// Sign-up form values.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
    pub lab_name: String,
}

/// Result of a sign-up. `session` is `None` when the service requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Remote authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Create an account.
    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, AuthError>;

    /// Send an account-recovery email.
    async fn recover(&self, email: &str) -> Result<(), AuthError>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, token: &RefreshToken) -> Result<AuthSession, AuthError>;

    /// The user a token belongs to.
    async fn get_user(&self, token: &AccessToken) -> Result<AuthUser, AuthError>;

    /// Revoke a token.
    async fn sign_out(&self, token: &AccessToken) -> Result<(), AuthError>;
}

/// Check a password against local rules before calling the service.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.secret".to_string());
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
        assert_eq!(token.expose(), "eyJhbGciOiJIUzI1NiJ9.secret");

        let refresh = RefreshToken::new("v1.refresh-secret".to_string());
        assert!(!format!("{refresh:?}").contains("secret"));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long-enough").is_ok());
    }
}
