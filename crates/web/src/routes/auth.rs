//! Authentication route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::plan_by_id;

use super::Layout;
use super::checkout::record_pending_capture;
use super::landing::PlanView;
use crate::auth::SignUp;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{GuestOnly, HOME_PATH, RequireAuth, clear_current_user, set_current_user};
use crate::models::{PendingCapture, session::keys};
use crate::services::Notices;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/recover", get(recover_page).post(recover))
        .route("/logout", post(logout))
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    /// Plan chosen on the landing page.
    pub plan: Option<PlanView>,
    /// A captured payment is waiting for this account.
    pub paid: bool,
    pub email: String,
    pub name: String,
    pub lab_name: String,
}

/// Recovery page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/recover.html")]
pub struct RecoverTemplate {
    pub layout: Layout,
    pub email: String,
}

// =============================================================================
// Form Data
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lab_name: String,
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecoverForm {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    pub plan: Option<String>,
}

// =============================================================================
// Login
// =============================================================================

/// Display the login page.
pub async fn login_page(_guest: GuestOnly, session: Session) -> LoginTemplate {
    LoginTemplate {
        layout: Layout::new("Sign in", "auth", None, Notices::take_flash(&session).await),
        email: String::new(),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    _guest: GuestOnly,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let mut notices = Notices::new();

    match state
        .auth()
        .sign_in(state.store(), &form.email, &form.password)
        .await
    {
        Ok(user) => {
            if let Err(e) = set_current_user(&session, &user).await {
                tracing::error!(error = %e, "Failed to store session user");
                notices.error("Could not start your session. Try again.");
            } else {
                set_sentry_user(&user.id(), Some(&user.profile.email));
                add_breadcrumb("auth", "User signed in", None);
                return Redirect::to(HOME_PATH).into_response();
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Sign-in failed");
            notices.error(e.user_message());
        }
    }

    LoginTemplate {
        layout: Layout::new("Sign in", "auth", None, notices),
        email: form.email,
    }
    .into_response()
}

// =============================================================================
// Registration
// =============================================================================

async fn pending_capture(session: &Session) -> Option<PendingCapture> {
    session
        .get::<PendingCapture>(keys::PENDING_CAPTURE)
        .await
        .ok()
        .flatten()
}

/// Display the registration page.
pub async fn register_page(
    _guest: GuestOnly,
    session: Session,
    Query(query): Query<PlanQuery>,
) -> RegisterTemplate {
    let pending = pending_capture(&session).await;
    let plan_id = query
        .plan
        .or_else(|| pending.as_ref().map(|p| p.plan.clone()));

    RegisterTemplate {
        layout: Layout::new(
            "Create account",
            "auth",
            None,
            Notices::take_flash(&session).await,
        ),
        plan: plan_id.as_deref().and_then(plan_by_id).map(PlanView::from),
        paid: pending.is_some(),
        email: String::new(),
        name: String::new(),
        lab_name: String::new(),
    }
}

/// Handle registration form submission.
///
/// When the service issues a session right away, the user is signed in and
/// any captured plan payment is recorded against the new account.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    _guest: GuestOnly,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let mut notices = Notices::new();

    if form.password == form.password_confirm {
        let request = SignUp {
            email: form.email.clone(),
            password: form.password.clone(),
            name: form.name.clone(),
            lab_name: form.lab_name.clone(),
        };
        match state.auth().sign_up(state.store(), &request).await {
            Ok(Some(user)) => match set_current_user(&session, &user).await {
                Ok(()) => {
                    set_sentry_user(&user.id(), Some(&user.profile.email));
                    add_breadcrumb("auth", "User registered", None);

                    let mut flash = Notices::new();
                    flash.success("Welcome! Your account is ready.");
                    record_pending_capture(state.store(), &session, &user, &mut flash).await;
                    flash.flash(&session).await;
                    return Redirect::to(HOME_PATH).into_response();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to store session user");
                    notices.error("Your account was created but the session could not start. Sign in.");
                }
            },
            Ok(None) => {
                let mut flash = Notices::new();
                flash.info("Check your email to confirm your account, then sign in.");
                flash.flash(&session).await;
                return Redirect::to("/auth/login").into_response();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                notices.error(e.user_message());
            }
        }
    } else {
        notices.error("Passwords do not match.");
    }

    let pending = pending_capture(&session).await;
    let plan_id = form
        .plan
        .clone()
        .or_else(|| pending.as_ref().map(|p| p.plan.clone()));

    RegisterTemplate {
        layout: Layout::new("Create account", "auth", None, notices),
        plan: plan_id.as_deref().and_then(plan_by_id).map(PlanView::from),
        paid: pending.is_some(),
        email: form.email,
        name: form.name,
        lab_name: form.lab_name,
    }
    .into_response()
}

// =============================================================================
// Recovery
// =============================================================================

/// Display the recovery page.
pub async fn recover_page(_guest: GuestOnly, session: Session) -> RecoverTemplate {
    RecoverTemplate {
        layout: Layout::new(
            "Recover access",
            "auth",
            None,
            Notices::take_flash(&session).await,
        ),
        email: String::new(),
    }
}

/// Send a recovery email.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn recover(
    _guest: GuestOnly,
    State(state): State<AppState>,
    Form(form): Form<RecoverForm>,
) -> RecoverTemplate {
    let mut notices = Notices::new();

    match state.auth().recover(&form.email).await {
        Ok(()) => {
            notices.success("If an account exists for that address, a recovery link is on its way.");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Recovery request failed");
            notices.error(e.user_message());
        }
    }

    RecoverTemplate {
        layout: Layout::new("Recover access", "auth", None, notices),
        email: form.email,
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and return to the landing page.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn logout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Redirect {
    state.auth().sign_out(user.id(), &user.token).await;

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session user");
    }
    clear_sentry_user();

    let mut flash = Notices::new();
    flash.info("You have been signed out.");
    flash.flash(&session).await;
    Redirect::to("/")
}
