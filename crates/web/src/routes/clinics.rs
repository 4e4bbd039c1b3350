//! Clinic registry route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{Clinic, ClinicId, ClinicInput};

use super::{ConfirmTemplate, Layout, flash_redirect, sentence};
use crate::db::ClinicRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::{ClinicDirectoryScreen, Notices};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", post(update))
        .route("/{id}/edit", get(edit))
        .route("/{id}/delete", get(confirm_delete).post(delete))
}

// =============================================================================
// Templates
// =============================================================================

/// Clinic list row.
#[derive(Debug, Clone)]
pub struct ClinicRow {
    pub id: ClinicId,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub dentists: usize,
}

/// Clinic list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/clinics.html")]
pub struct ClinicsTemplate {
    pub layout: Layout,
    pub clinics: Vec<ClinicRow>,
    /// Values of the create form, kept after a rejected submission.
    pub form: ClinicInput,
}

/// Clinic edit form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/clinic_edit.html")]
pub struct ClinicEditTemplate {
    pub layout: Layout,
    pub id: ClinicId,
    pub form: ClinicInput,
}

fn render(
    user: &CurrentUser,
    screen: &ClinicDirectoryScreen,
    notices: Notices,
    form: ClinicInput,
) -> ClinicsTemplate {
    let directory = &screen.directory;
    ClinicsTemplate {
        layout: Layout::new("Clinics", "clinics", Some(user), notices),
        clinics: directory
            .clinics
            .iter()
            .map(|c| ClinicRow {
                id: c.id,
                name: c.name.clone(),
                address: c.address.clone(),
                phone: c.phone.clone(),
                email: c.email.clone(),
                dentists: directory.dentists_of(c.id).count(),
            })
            .collect(),
        form,
    }
}

fn input_of(clinic: &Clinic) -> ClinicInput {
    ClinicInput {
        name: clinic.name.clone(),
        address: clinic.address.clone(),
        phone: clinic.phone.clone(),
        email: clinic.email.clone(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List clinics.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> ClinicsTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    render(&user, &screen, notices, ClinicInput::default())
}

/// Create a clinic.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ClinicInput>,
) -> Response {
    let mut notices = Notices::new();

    let input = match form.clone().validate() {
        Ok(input) => input,
        Err(e) => {
            let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
            notices.error(sentence(&e));
            return render(&user, &screen, notices, form).into_response();
        }
    };

    let repo = ClinicRepository::new(state.store(), &user.token, user.id());
    match repo.create(&input).await {
        Ok(clinic) => {
            tracing::info!(clinic_id = %clinic.id, "Clinic created");
            notices.success(format!("Clinic \"{}\" created.", clinic.name));
            flash_redirect(&session, notices, "/clinics").await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create clinic");
            let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
            notices.error(e.user_message());
            render(&user, &screen, notices, form).into_response()
        }
    }
}

/// Display the clinic edit form.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn edit(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ClinicId>,
) -> Result<ClinicEditTemplate> {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    let clinic = screen
        .directory
        .clinics
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("clinic {id}")))?;

    Ok(ClinicEditTemplate {
        layout: Layout::new("Edit clinic", "clinics", Some(&user), notices),
        id,
        form: input_of(clinic),
    })
}

/// Save clinic edits.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ClinicId>,
    Form(form): Form<ClinicInput>,
) -> Response {
    let mut notices = Notices::new();
    let input = match form.clone().validate() {
        Ok(input) => input,
        Err(e) => {
            notices.error(sentence(&e));
            return ClinicEditTemplate {
                layout: Layout::new("Edit clinic", "clinics", Some(&user), notices),
                id,
                form,
            }
            .into_response();
        }
    };

    let repo = ClinicRepository::new(state.store(), &user.token, user.id());
    match repo.update(id, &input).await {
        Ok(clinic) => {
            notices.success(format!("Clinic \"{}\" saved.", clinic.name));
            flash_redirect(&session, notices, "/clinics").await
        }
        Err(e) => {
            tracing::warn!(error = %e, clinic_id = %id, "Failed to update clinic");
            notices.error(e.user_message());
            ClinicEditTemplate {
                layout: Layout::new("Edit clinic", "clinics", Some(&user), notices),
                id,
                form,
            }
            .into_response()
        }
    }
}

/// Ask before deleting a clinic and its dentists.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ClinicId>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    let clinic = screen
        .directory
        .clinics
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("clinic {id}")))?;
    let dentists = screen.directory.dentists_of(id).count();

    let message = match dentists {
        0 => format!("Delete the clinic \"{}\"?", clinic.name),
        1 => format!(
            "Delete the clinic \"{}\" and its 1 dentist? This cannot be undone.",
            clinic.name
        ),
        n => format!(
            "Delete the clinic \"{}\" and its {n} dentists? This cannot be undone.",
            clinic.name
        ),
    };

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete clinic", "clinics", Some(&user), notices),
        heading: "Delete clinic".to_string(),
        message,
        action: format!("/clinics/{id}/delete"),
        button: "Delete".to_string(),
        cancel: "/clinics".to_string(),
    })
}

/// Delete a clinic and its dentists.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ClinicId>,
) -> Response {
    let mut loading = Notices::new();
    let mut screen = ClinicDirectoryScreen::load(state.store(), &user, &mut loading).await;

    let mut outcome = Notices::new();
    match screen
        .delete_clinic(state.store(), &user, id, &mut outcome)
        .await
    {
        Ok(clinic) => outcome.success(format!("Clinic \"{}\" deleted.", clinic.name)),
        Err(e) => {
            tracing::warn!(error = %e, clinic_id = %id, "Failed to delete clinic");
            outcome.error(e.user_message());
        }
    }

    flash_redirect(&session, outcome, "/clinics").await
}
