//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Landing page with plans
//!
//! # Auth (guests only, except logout)
//! GET  /auth/login, POST /auth/login
//! GET  /auth/register, POST /auth/register
//! GET  /auth/recover, POST /auth/recover
//! POST /auth/logout
//!
//! # Checkout (payment widget callbacks)
//! POST /checkout/capture
//! POST /checkout/error
//!
//! # Registries
//! GET  /clinics, POST /clinics
//! GET  /clinics/{id}/edit, POST /clinics/{id}
//! GET  /clinics/{id}/delete, POST /clinics/{id}/delete
//! (same shape for /dentists, /services, /technicians)
//! GET  /pricing
//! POST /pricing/{id}/price
//! POST /pricing/{id}/toggle
//!
//! # Work orders
//! GET  /work-orders, POST /work-orders
//! GET  /work-orders/dentists           - Dentist picker for a clinic
//! POST /work-orders/cart/add | remove | clear
//! GET  /work-orders/finalize, POST /work-orders/finalize
//! POST /work-orders/{id}/status
//! GET  /work-orders/{id}/edit, POST /work-orders/{id}
//! POST /work-orders/{id}/lines/{index}/delete
//! GET  /work-orders/{id}/delete, POST /work-orders/{id}/delete
//! GET  /work-orders/{id}/report
//!
//! # Lab configuration
//! GET  /settings, POST /settings
//! GET  /settings/preview
//!
//! # Back-office (administrators only)
//! GET  /admin
//! GET  /admin/users
//! POST /admin/users/{id}/toggle
//! GET  /admin/users/{id}/delete, POST /admin/users/{id}/delete
//! GET  /admin/memberships
//! GET  /admin/payments
//! ```

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod clinics;
pub mod dentists;
pub mod landing;
pub mod pricing;
pub mod settings;
pub mod technicians;
pub mod work_orders;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tower_sessions::Session;

use crate::filters;
use crate::models::CurrentUser;
use crate::services::Notices;
use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(landing::index))
        .nest("/auth", auth::routes())
        .nest("/checkout", checkout::routes())
        .nest("/clinics", clinics::routes())
        .nest("/dentists", dentists::routes())
        .nest("/services", catalog::routes())
        .nest("/technicians", technicians::routes())
        .nest("/pricing", pricing::routes())
        .nest("/work-orders", work_orders::routes())
        .nest("/settings", settings::routes())
        .nest("/admin", admin::routes())
}

// =============================================================================
// Shared view types
// =============================================================================

/// Signed-in user as shown in the navigation bar.
#[derive(Debug, Clone)]
pub struct NavUser {
    pub name: String,
    pub lab_name: String,
    pub is_admin: bool,
}

/// Page chrome shared by every template.
#[derive(Debug, Clone)]
pub struct Layout {
    pub title: String,
    /// Navigation section to highlight.
    pub section: &'static str,
    pub user: Option<NavUser>,
    pub notices: Notices,
}

impl Layout {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        section: &'static str,
        user: Option<&CurrentUser>,
        notices: Notices,
    ) -> Self {
        Self {
            title: title.into(),
            section,
            user: user.map(|u| NavUser {
                name: u.profile.display_name().to_string(),
                lab_name: u.profile.lab_name.clone(),
                is_admin: u.is_admin(),
            }),
            notices,
        }
    }
}

/// Generic confirmation page for destructive actions.
#[derive(Template, WebTemplate)]
#[template(path = "confirm.html")]
pub struct ConfirmTemplate {
    pub layout: Layout,
    pub heading: String,
    pub message: String,
    /// Form target performing the action.
    pub action: String,
    pub button: String,
    pub cancel: String,
}

/// One `<option>` of a select box.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    #[must_use]
    pub fn new(value: impl ToString, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.to_string(),
            label: label.into(),
            selected,
        }
    }
}

/// Whether an HTML checkbox was ticked.
#[must_use]
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("on" | "true" | "1"))
}

/// Finish a successful mutation: carry `notices` to `to` and redirect there
/// with 303, so reloading the next page does not resubmit the form.
pub async fn flash_redirect(session: &Session, notices: Notices, to: &str) -> Response {
    notices.flash(session).await;
    Redirect::to(to).into_response()
}

/// A validation error as a notice sentence.
///
/// Domain messages are lower-case fragments such as `clinic name is
/// required`; notices are capitalized and end with a full stop.
#[must_use]
pub fn sentence(error: &impl std::fmt::Display) -> String {
    let message = error.to_string();
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        let mut text: String = first.to_uppercase().chain(chars).collect();
        if !text.ends_with('.') {
            text.push('.');
        }
        text
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence() {
        assert_eq!(sentence(&"clinic name is required"), "Clinic name is required.");
        assert_eq!(sentence(&"Already done."), "Already done.");
        assert_eq!(sentence(&""), "");
    }

    #[test]
    fn test_checkbox() {
        assert!(checkbox(Some("on")));
        assert!(checkbox(Some("true")));
        assert!(!checkbox(Some("")));
        assert!(!checkbox(None));
    }
}
