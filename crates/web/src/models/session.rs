//! Session-related types.
//!
//! Types stored in the session for authentication and in-progress work.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dentalab_core::{UserId, UserProfile};

use crate::auth::{AccessToken, AuthSession, RefreshToken};

/// Session-stored identity.
///
/// Holds the derived profile plus the bearer token every data-store call is
/// made with. A token past `expires_at` must be renewed with `refresh_token`
/// before the next data-store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub profile: UserProfile,
    pub token: AccessToken,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
}

impl CurrentUser {
    #[must_use]
    pub fn new(profile: UserProfile, session: &AuthSession) -> Self {
        Self {
            profile,
            token: session.access_token.clone(),
            expires_at: session.expires_at,
            refresh_token: session.refresh_token.clone(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> UserId {
        self.profile.id
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.profile.is_admin()
    }
}

/// A captured plan payment waiting for the account it pays for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCapture {
    /// Payment reference from the widget.
    pub reference: String,
    pub plan: String,
    pub amount: Decimal,
    pub currency: String,
    pub captured_at: DateTime<Utc>,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for flash notices carried across a redirect.
    pub const FLASH: &str = "flash";

    /// Key for the in-progress work-order cart.
    pub const CART: &str = "work_order_cart";

    /// Key for the header fields of the order being composed.
    pub const DRAFT: &str = "work_order_draft";

    /// Key for a captured payment awaiting registration.
    pub const PENDING_CAPTURE: &str = "pending_capture";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use dentalab_core::UserRole;

    use super::*;

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let user = CurrentUser {
            profile: UserProfile {
                id: UserId::generate(),
                email: "lab@dentalworks.test".to_string(),
                name: "Ana".to_string(),
                role: UserRole::Client,
                lab_name: "Dental Works".to_string(),
                active: true,
                registered_at: None,
            },
            token: AccessToken::new("tok".to_string()),
            expires_at: now + Duration::minutes(5),
            refresh_token: None,
        };

        assert!(!user.is_expired(now));
        assert!(user.is_expired(now + Duration::minutes(5)));
        assert!(!user.is_admin());
    }
}
