//! Technician registry route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{LocalList, Technician, TechnicianId, TechnicianInput};

use super::{ConfirmTemplate, Layout, checkbox, flash_redirect, sentence};
use crate::db::TechnicianRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::{Notices, loaded};
use crate::state::AppState;
use crate::store::DataStore;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", post(update))
        .route("/{id}/edit", get(edit))
        .route("/{id}/delete", get(confirm_delete).post(delete))
}

/// Raw technician form values.
#[derive(Debug, Clone, Deserialize)]
pub struct TechnicianForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    pub active: Option<String>,
}

impl Default for TechnicianForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            specialty: String::new(),
            active: Some("on".to_string()),
        }
    }
}

impl TechnicianForm {
    fn from_technician(technician: &Technician) -> Self {
        Self {
            name: technician.name.clone(),
            specialty: technician.specialty.clone(),
            active: technician.active.then(|| "on".to_string()),
        }
    }

    fn input(&self) -> TechnicianInput {
        TechnicianInput {
            name: self.name.clone(),
            specialty: self.specialty.clone(),
            active: checkbox(self.active.as_deref()),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        checkbox(self.active.as_deref())
    }
}

/// Technician list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/technicians.html")]
pub struct TechniciansTemplate {
    pub layout: Layout,
    pub technicians: Vec<Technician>,
    pub form: TechnicianForm,
}

/// Technician edit form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/technician_edit.html")]
pub struct TechnicianEditTemplate {
    pub layout: Layout,
    pub id: TechnicianId,
    pub form: TechnicianForm,
}

async fn load(
    store: &dyn DataStore,
    user: &CurrentUser,
    notices: &mut Notices,
) -> LocalList<Technician> {
    let repo = TechnicianRepository::new(store, &user.token, user.id());
    LocalList::new(loaded("Technicians", repo.list().await, notices))
}

fn render(
    user: &CurrentUser,
    technicians: &LocalList<Technician>,
    notices: Notices,
    form: TechnicianForm,
) -> TechniciansTemplate {
    TechniciansTemplate {
        layout: Layout::new("Technicians", "technicians", Some(user), notices),
        technicians: technicians.items().to_vec(),
        form,
    }
}

fn edit_page(
    user: &CurrentUser,
    notices: Notices,
    id: TechnicianId,
    form: TechnicianForm,
) -> TechnicianEditTemplate {
    TechnicianEditTemplate {
        layout: Layout::new("Edit technician", "technicians", Some(user), notices),
        id,
        form,
    }
}

/// List technicians.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> TechniciansTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let technicians = load(state.store(), &user, &mut notices).await;
    render(&user, &technicians, notices, TechnicianForm::default())
}

/// Create a technician.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<TechnicianForm>,
) -> Response {
    let mut notices = Notices::new();

    let input = match form.input().validate() {
        Ok(input) => input,
        Err(e) => {
            let technicians = load(state.store(), &user, &mut notices).await;
            notices.error(sentence(&e));
            return render(&user, &technicians, notices, form).into_response();
        }
    };

    let repo = TechnicianRepository::new(state.store(), &user.token, user.id());
    match repo.create(&input).await {
        Ok(technician) => {
            tracing::info!(technician_id = %technician.id, "Technician created");
            notices.success(format!("Technician \"{}\" added.", technician.name));
            flash_redirect(&session, notices, "/technicians").await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create technician");
            let technicians = load(state.store(), &user, &mut notices).await;
            notices.error(e.user_message());
            render(&user, &technicians, notices, form).into_response()
        }
    }
}

/// Display the technician edit form.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn edit(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TechnicianId>,
) -> Result<TechnicianEditTemplate> {
    let mut notices = Notices::new();
    let technicians = load(state.store(), &user, &mut notices).await;
    let technician = technicians
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("technician {id}")))?;

    Ok(edit_page(
        &user,
        notices,
        id,
        TechnicianForm::from_technician(technician),
    ))
}

/// Save technician edits.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<TechnicianId>,
    Form(form): Form<TechnicianForm>,
) -> Response {
    let mut notices = Notices::new();
    let input = match form.input().validate() {
        Ok(input) => input,
        Err(e) => {
            notices.error(sentence(&e));
            return edit_page(&user, notices, id, form).into_response();
        }
    };

    let repo = TechnicianRepository::new(state.store(), &user.token, user.id());
    match repo.update(id, &input).await {
        Ok(technician) => {
            notices.success(format!("Technician \"{}\" saved.", technician.name));
            flash_redirect(&session, notices, "/technicians").await
        }
        Err(e) => {
            tracing::warn!(error = %e, technician_id = %id, "Failed to update technician");
            notices.error(e.user_message());
            edit_page(&user, notices, id, form).into_response()
        }
    }
}

/// Ask before deleting a technician.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TechnicianId>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let technicians = load(state.store(), &user, &mut notices).await;
    let technician = technicians
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("technician {id}")))?;

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete technician", "technicians", Some(&user), notices),
        heading: "Delete technician".to_string(),
        message: format!("Delete the technician \"{}\"?", technician.name),
        action: format!("/technicians/{id}/delete"),
        button: "Delete".to_string(),
        cancel: "/technicians".to_string(),
    })
}

/// Delete a technician.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<TechnicianId>,
) -> Response {
    let mut notices = Notices::new();

    let repo = TechnicianRepository::new(state.store(), &user.token, user.id());
    match repo.delete(id).await {
        Ok(technician) => {
            tracing::info!(technician_id = %id, "Technician deleted");
            notices.success(format!("Technician \"{}\" deleted.", technician.name));
        }
        Err(e) => {
            tracing::warn!(error = %e, technician_id = %id, "Failed to delete technician");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, "/technicians").await
}
