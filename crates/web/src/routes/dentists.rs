//! Dentist registry route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{ClinicId, Dentist, DentistFields, DentistId, DentistInput, parse_optional_id};

use super::{ConfirmTemplate, Layout, SelectOption, flash_redirect, sentence};
use crate::db::DentistRepository;
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
// Form Data
// =============================================================================

/// Raw dentist form values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DentistForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub clinic_id: String,
}

impl DentistForm {
    fn from_dentist(dentist: &Dentist) -> Self {
        Self {
            name: dentist.name.clone(),
            specialty: dentist.specialty.clone(),
            clinic_id: dentist.clinic_id.to_string(),
        }
    }

    /// Validate against the loaded clinics.
    fn validate(&self, screen: &ClinicDirectoryScreen) -> std::result::Result<DentistFields, String> {
        let clinic_id = parse_optional_id::<ClinicId>(Some(self.clinic_id.as_str()))
            .ok()
            .flatten();
        let fields = DentistInput {
            name: self.name.clone(),
            specialty: self.specialty.clone(),
            clinic_id,
        }
        .validate()
        .map_err(|e| sentence(&e))?;

        if screen.directory.clinics.get(fields.clinic_id).is_none() {
            return Err("The selected clinic no longer exists.".to_string());
        }
        Ok(fields)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClinicFilterQuery {
    pub clinic_id: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Dentist list row.
#[derive(Debug, Clone)]
pub struct DentistRow {
    pub id: DentistId,
    pub name: String,
    pub specialty: String,
    pub clinic: String,
}

/// Dentist list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/dentists.html")]
pub struct DentistsTemplate {
    pub layout: Layout,
    pub dentists: Vec<DentistRow>,
    /// Clinic filter choices; the empty value means all clinics.
    pub filter: Vec<SelectOption>,
    /// Clinic choices of the create form.
    pub clinics: Vec<SelectOption>,
    pub form: DentistForm,
}

/// Dentist edit form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/dentist_edit.html")]
pub struct DentistEditTemplate {
    pub layout: Layout,
    pub id: DentistId,
    pub clinics: Vec<SelectOption>,
    pub form: DentistForm,
}

fn clinic_options(screen: &ClinicDirectoryScreen, selected: &str) -> Vec<SelectOption> {
    screen
        .directory
        .clinics
        .iter()
        .map(|c| {
            let value = c.id.to_string();
            let is_selected = value == selected;
            SelectOption::new(value, c.name.clone(), is_selected)
        })
        .collect()
}

fn render(
    user: &CurrentUser,
    screen: &ClinicDirectoryScreen,
    notices: Notices,
    clinic_filter: Option<ClinicId>,
    form: DentistForm,
) -> DentistsTemplate {
    let directory = &screen.directory;
    let selected = clinic_filter.map(|c| c.to_string()).unwrap_or_default();

    DentistsTemplate {
        layout: Layout::new("Dentists", "dentists", Some(user), notices),
        dentists: directory
            .dentists
            .iter()
            .filter(|d| clinic_filter.is_none_or(|c| d.clinic_id == c))
            .map(|d| DentistRow {
                id: d.id,
                name: d.name.clone(),
                specialty: d.specialty.clone(),
                clinic: directory
                    .clinic_name(d.clinic_id)
                    .unwrap_or("Unknown clinic")
                    .to_string(),
            })
            .collect(),
        filter: clinic_options(screen, &selected),
        clinics: clinic_options(screen, &form.clinic_id),
        form,
    }
}

fn edit_page(
    user: &CurrentUser,
    screen: &ClinicDirectoryScreen,
    notices: Notices,
    id: DentistId,
    form: DentistForm,
) -> DentistEditTemplate {
    DentistEditTemplate {
        layout: Layout::new("Edit dentist", "dentists", Some(user), notices),
        id,
        clinics: clinic_options(screen, &form.clinic_id),
        form,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List dentists, optionally of one clinic.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ClinicFilterQuery>,
) -> DentistsTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    let clinic = parse_optional_id(query.clinic_id.as_deref()).ok().flatten();

    // Preselect the filtered clinic in the create form.
    let form = DentistForm {
        clinic_id: clinic.map(|c: ClinicId| c.to_string()).unwrap_or_default(),
        ..DentistForm::default()
    };
    render(&user, &screen, notices, clinic, form)
}

/// Create a dentist.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DentistForm>,
) -> Response {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;

    let fields = match form.validate(&screen) {
        Ok(fields) => fields,
        Err(message) => {
            notices.error(message);
            return render(&user, &screen, notices, None, form).into_response();
        }
    };

    let repo = DentistRepository::new(state.store(), &user.token, user.id());
    match repo.create(&fields).await {
        Ok(dentist) => {
            tracing::info!(dentist_id = %dentist.id, clinic_id = %dentist.clinic_id, "Dentist created");
            let mut outcome = Notices::new();
            outcome.success(format!("Dentist \"{}\" added.", dentist.name));
            let next = format!("/dentists?clinic_id={}", dentist.clinic_id);
            flash_redirect(&session, outcome, &next).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create dentist");
            notices.error(e.user_message());
            render(&user, &screen, notices, None, form).into_response()
        }
    }
}

/// Display the dentist edit form.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn edit(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DentistId>,
) -> Result<DentistEditTemplate> {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    let dentist = screen
        .directory
        .dentists
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("dentist {id}")))?;
    let form = DentistForm::from_dentist(dentist);

    Ok(edit_page(&user, &screen, notices, id, form))
}

/// Save dentist edits.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<DentistId>,
    Form(form): Form<DentistForm>,
) -> Response {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;

    let fields = match form.validate(&screen) {
        Ok(fields) => fields,
        Err(message) => {
            notices.error(message);
            return edit_page(&user, &screen, notices, id, form).into_response();
        }
    };

    let repo = DentistRepository::new(state.store(), &user.token, user.id());
    match repo.update(id, &fields).await {
        Ok(dentist) => {
            let mut outcome = Notices::new();
            outcome.success(format!("Dentist \"{}\" saved.", dentist.name));
            flash_redirect(&session, outcome, "/dentists").await
        }
        Err(e) => {
            tracing::warn!(error = %e, dentist_id = %id, "Failed to update dentist");
            notices.error(e.user_message());
            edit_page(&user, &screen, notices, id, form).into_response()
        }
    }
}

/// Ask before deleting a dentist.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DentistId>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let screen = ClinicDirectoryScreen::load(state.store(), &user, &mut notices).await;
    let dentist = screen
        .directory
        .dentists
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("dentist {id}")))?;

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete dentist", "dentists", Some(&user), notices),
        heading: "Delete dentist".to_string(),
        message: format!("Delete the dentist \"{}\"?", dentist.name),
        action: format!("/dentists/{id}/delete"),
        button: "Delete".to_string(),
        cancel: "/dentists".to_string(),
    })
}

/// Delete a dentist.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<DentistId>,
) -> Response {
    let mut notices = Notices::new();

    let repo = DentistRepository::new(state.store(), &user.token, user.id());
    match repo.delete(id).await {
        Ok(dentist) => {
            tracing::info!(dentist_id = %id, "Dentist deleted");
            notices.success(format!("Dentist \"{}\" deleted.", dentist.name));
        }
        Err(e) => {
            tracing::warn!(error = %e, dentist_id = %id, "Failed to delete dentist");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, "/dentists").await
}
