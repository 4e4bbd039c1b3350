//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] dentalab_core::EmailError),

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The account has been deactivated by an administrator.
    #[error("account is inactive")]
    Inactive,

    /// The access token is missing, expired or revoked.
    #[error("session expired")]
    SessionExpired,

    /// Too many attempts.
    #[error("rate limited")]
    RateLimited,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth service returned an unexpected error.
    #[error("auth service error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Loading the account profile failed.
    #[error("profile error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Text shown to the user in a notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Enter a valid email address.".to_string(),
            Self::InvalidCredentials => "Incorrect email or password.".to_string(),
            Self::UserAlreadyExists => "An account with this email already exists.".to_string(),
            Self::WeakPassword(msg) => msg.clone(),
            Self::Inactive => {
                "Your account is inactive. Contact the administrator to reactivate it.".to_string()
            }
            Self::SessionExpired => "Your session has expired. Sign in again.".to_string(),
            Self::RateLimited => "Too many attempts. Wait a moment and try again.".to_string(),
            Self::Http(_) => {
                "Could not reach the authentication service. Try again shortly.".to_string()
            }
            Self::Api { message, .. } => message.clone(),
            Self::Parse(_) => "The authentication service returned an unexpected response.".to_string(),
            Self::Repository(err) => err.user_message(),
        }
    }
}
