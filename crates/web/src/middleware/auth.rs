//! Authentication extractors.
//!
//! The signed-in user lives in the session as a [`CurrentUser`]. Every request
//! re-reads the profile, so a deactivated account is signed out on its next
//! request. An expired access token is renewed with the refresh token; when
//! that fails the user counts as signed out and is removed from the session.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use crate::auth::AuthError;
use crate::models::{CurrentUser, session::keys};
use crate::services::Notices;
use crate::state::AppState;

/// Where signed-in users land.
pub const HOME_PATH: &str = "/work-orders";

/// Extractor that requires a signed-in user.
///
/// Redirects to the login page (or answers 401 for `/api/` paths) when there
/// is no valid session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.profile.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in administrator.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that only admits visitors who are not signed in.
///
/// Signed-in users are redirected to [`HOME_PATH`].
#[derive(Debug)]
pub struct GuestOnly;

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Rejection for the authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but not an administrator.
    Forbidden,
    /// Already signed in.
    RedirectHome,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => {
                (StatusCode::FORBIDDEN, "Administrator access required").into_response()
            }
            Self::RedirectHome => Redirect::to(HOME_PATH).into_response(),
        }
    }
}

/// Read the session user, renewing or dropping it as needed.
async fn session_user(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    let user: CurrentUser = session.get(keys::CURRENT_USER).await.ok().flatten()?;

    let auth = state.auth();
    let checked = if user.is_expired(Utc::now()) {
        auth.refresh(state.store(), &user).await
    } else {
        auth.revalidate(state.store(), user.clone()).await
    };

    match checked {
        Ok(current) => {
            if current != user
                && let Err(e) = session.insert(keys::CURRENT_USER, &current).await
            {
                tracing::warn!(error = %e, user_id = %current.id(), "Failed to store renewed session user");
            }
            Some(current)
        }
        Err(e) => {
            tracing::info!(user_id = %user.id(), reason = %e, "Session ended");
            if let Err(e) = clear_current_user(session).await {
                tracing::warn!(error = %e, "Failed to clear ended session user");
            }
            let mut notices = Notices::new();
            notices.warning(e.user_message());
            notices.flash(session).await;
            if matches!(e, AuthError::Inactive) {
                auth.sign_out(user.id(), &user.token).await;
            } else {
                auth.expire(user.id());
            }
            None
        }
    }
}

fn missing_session(parts: &Parts) -> AuthRejection {
    if parts.uri.path().starts_with("/api/") {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts, &AppState::from_ref(state))
            .await
            .map(Self)
            .ok_or_else(|| missing_session(parts))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts, &AppState::from_ref(state))
            .await
            .ok_or_else(|| missing_session(parts))?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id(), path = %parts.uri.path(), "Non-admin denied");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for GuestOnly
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match session_user(parts, &AppState::from_ref(state)).await {
            Some(_) => Err(AuthRejection::RedirectHome),
            None => Ok(Self),
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts, &AppState::from_ref(state)).await))
    }
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled first so a pre-login session cannot be fixed.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Clear the signed-in user and any in-progress work (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    session
        .remove::<dentalab_core::Cart>(keys::CART)
        .await?;
    session.remove_value(keys::DRAFT).await?;
    Ok(())
}
