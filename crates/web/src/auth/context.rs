//! Application-level authentication context.
//!
//! Created once at start-up and held in `AppState`. Wraps the auth provider,
//! derives the user-facing profile from the `usuarios` table and publishes
//! sign-in/sign-out events on a broadcast channel. The binary subscribes one
//! logging listener at start-up and aborts it on shutdown.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use dentalab_core::{Email, UserId, UserProfile, UserRole};

use super::{AccessToken, AuthError, AuthProvider, AuthSession, AuthUser, SignUp, validate_password};
use crate::db::UserRepository;
use crate::models::CurrentUser;
use crate::store::DataStore;

const EVENT_CAPACITY: usize = 64;

/// Session-change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: UserId, email: String },
    SignedOut { user_id: UserId },
}

/// Explicit authentication context shared by all handlers.
#[derive(Clone)]
pub struct AuthContext {
    provider: Arc<dyn AuthProvider>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { provider, events }
    }

    /// Subscribe to session-change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Sign in and derive the session user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a wrong email or password,
    /// `AuthError::Inactive` if an administrator deactivated the account, or
    /// the underlying service or store error.
    pub async fn sign_in(
        &self,
        store: &dyn DataStore,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email)?;
        let session = self.provider.sign_in(email.as_str(), password).await?;
        let current = self.establish(store, &session).await?;

        if !current.profile.active {
            tracing::warn!(user_id = %current.id(), "Inactive account attempted sign-in");
            if let Err(e) = self.provider.sign_out(&session.access_token).await {
                tracing::warn!(error = %e, "Failed to revoke token of inactive account");
            }
            return Err(AuthError::Inactive);
        }

        self.publish(AuthEvent::SignedIn {
            user_id: current.id(),
            email: current.profile.email.clone(),
        });
        Ok(current)
    }

    /// Create an account.
    ///
    /// Returns the signed-in user when the service issues a session right
    /// away, or `None` when the account awaits email confirmation. The
    /// profile row is written best-effort.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` for invalid input or a rejected sign-up.
    pub async fn sign_up(
        &self,
        store: &dyn DataStore,
        request: &SignUp,
    ) -> Result<Option<CurrentUser>, AuthError> {
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;

        let request = SignUp {
            email: email.into_inner(),
            name: request.name.trim().to_string(),
            lab_name: request.lab_name.trim().to_string(),
            password: request.password.clone(),
        };
        let outcome = self.provider.sign_up(&request).await?;
        tracing::info!(user_id = %outcome.user.id, "Account created");

        let Some(session) = outcome.session else {
            return Ok(None);
        };

        let profile = UserProfile {
            id: session.user.id,
            email: session.user.email.clone(),
            name: request.name,
            role: UserRole::Client,
            lab_name: request.lab_name,
            active: true,
            registered_at: Some(Utc::now()),
        };
        let repo = UserRepository::new(store, &session.access_token);
        let profile = match repo.create(&profile).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %profile.id, "Failed to create profile row");
                profile
            }
        };

        let current = CurrentUser::new(profile, &session);
        self.publish(AuthEvent::SignedIn {
            user_id: current.id(),
            email: current.profile.email.clone(),
        });
        Ok(Some(current))
    }

    /// Send an account-recovery email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` for an invalid email or a service failure.
    pub async fn recover(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        self.provider.recover(email.as_str()).await
    }

    /// Resolve the user a session token belongs to and derive their profile.
    ///
    /// The profile comes from the `usuarios` row; without one the user is a
    /// client with the lab name from sign-up metadata.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` for a rejected token, or a store
    /// error while reading the profile.
    pub async fn establish(
        &self,
        store: &dyn DataStore,
        session: &AuthSession,
    ) -> Result<CurrentUser, AuthError> {
        let user = self.provider.get_user(&session.access_token).await?;
        let repo = UserRepository::new(store, &session.access_token);
        let profile = repo
            .get(user.id)
            .await?
            .unwrap_or_else(|| default_profile(&user));
        Ok(CurrentUser::new(profile, session))
    }

    /// Renew a session whose access token has expired.
    ///
    /// The profile is read again under the new token, so role changes apply
    /// and a deactivated account is refused.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` when there is no refresh token or
    /// the service rejects it, `AuthError::Inactive` for a deactivated
    /// account, or the underlying service or store error.
    pub async fn refresh(
        &self,
        store: &dyn DataStore,
        user: &CurrentUser,
    ) -> Result<CurrentUser, AuthError> {
        let token = user.refresh_token.as_ref().ok_or(AuthError::SessionExpired)?;
        let session = self.provider.refresh(token).await?;
        let current = self.establish(store, &session).await?;

        if !current.profile.active {
            if let Err(e) = self.provider.sign_out(&session.access_token).await {
                tracing::warn!(error = %e, "Failed to revoke token of inactive account");
            }
            return Err(AuthError::Inactive);
        }

        tracing::debug!(user_id = %current.id(), expires_at = %current.expires_at, "Session refreshed");
        Ok(current)
    }

    /// Re-read the profile of a signed-in user.
    ///
    /// A missing row or a failed read keeps the stored profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Inactive` once an administrator has deactivated
    /// the account.
    pub async fn revalidate(
        &self,
        store: &dyn DataStore,
        user: CurrentUser,
    ) -> Result<CurrentUser, AuthError> {
        let repo = UserRepository::new(store, &user.token);
        match repo.get(user.id()).await {
            Ok(Some(profile)) if !profile.active => Err(AuthError::Inactive),
            Ok(Some(profile)) => Ok(CurrentUser { profile, ..user }),
            Ok(None) => Ok(user),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id(), "Failed to re-read profile");
                Ok(user)
            }
        }
    }

    /// Record a session that ended without the user signing out.
    pub fn expire(&self, user_id: UserId) {
        self.publish(AuthEvent::SignedOut { user_id });
    }

    /// Revoke the token. Failures are logged; the local session is cleared
    /// by the caller either way.
    pub async fn sign_out(&self, user_id: UserId, token: &AccessToken) {
        if let Err(e) = self.provider.sign_out(token).await {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to revoke token on sign-out");
        }
        self.publish(AuthEvent::SignedOut { user_id });
    }

    /// Spawn the listener that logs session changes.
    #[must_use]
    pub fn spawn_event_logger(&self) -> JoinHandle<()> {
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn { user_id, email }) => {
                        tracing::info!(user_id = %user_id, email = %email, "User signed in");
                    }
                    Ok(AuthEvent::SignedOut { user_id }) => {
                        tracing::info!(user_id = %user_id, "User signed out");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

fn default_profile(user: &AuthUser) -> UserProfile {
    UserProfile {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone().unwrap_or_default(),
        role: UserRole::Client,
        lab_name: user.lab_name.clone().unwrap_or_default(),
        active: true,
        registered_at: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_uses_metadata() {
        let user = AuthUser {
            id: UserId::generate(),
            email: "lab@dentalworks.test".to_string(),
            name: None,
            lab_name: Some("Dental Works".to_string()),
        };
        let profile = default_profile(&user);
        assert_eq!(profile.role, UserRole::Client);
        assert_eq!(profile.lab_name, "Dental Works");
        assert!(profile.active);
        assert_eq!(profile.display_name(), "lab@dentalworks.test");
    }
}
