//! Service catalogue route handlers.

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

use dentalab_core::{LocalList, Service, ServiceCategory, ServiceId, ServiceInput};

use super::{ConfirmTemplate, Layout, SelectOption, checkbox, flash_redirect, sentence};
use crate::db::ServiceRepository;
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

// =============================================================================
// Form Data
// =============================================================================

/// Raw service form values.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_price: String,
    #[serde(default)]
    pub category: String,
    pub active: Option<String>,
}

impl Default for ServiceForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_price: String::new(),
            category: ServiceCategory::default().as_str().to_string(),
            active: Some("on".to_string()),
        }
    }
}

impl ServiceForm {
    fn from_service(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            base_price: service.base_price.to_string(),
            category: service.category.as_str().to_string(),
            active: service.active.then(|| "on".to_string()),
        }
    }

    fn input(&self) -> ServiceInput {
        ServiceInput {
            name: self.name.clone(),
            base_price: self.base_price.clone(),
            category: self.category.clone(),
            active: checkbox(self.active.as_deref()),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        checkbox(self.active.as_deref())
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Service list row.
#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub id: ServiceId,
    pub name: String,
    pub category: &'static str,
    pub base_price: String,
    pub active: bool,
}

/// Service list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/services.html")]
pub struct ServicesTemplate {
    pub layout: Layout,
    pub services: Vec<ServiceRow>,
    pub categories: Vec<SelectOption>,
    pub form: ServiceForm,
}

/// Service edit form.
#[derive(Template, WebTemplate)]
#[template(path = "registry/service_edit.html")]
pub struct ServiceEditTemplate {
    pub layout: Layout,
    pub id: ServiceId,
    pub categories: Vec<SelectOption>,
    pub form: ServiceForm,
}

pub(super) fn category_options(selected: &str) -> Vec<SelectOption> {
    ServiceCategory::ALL
        .iter()
        .map(|c| SelectOption::new(c.as_str(), c.label(), c.as_str() == selected))
        .collect()
}

async fn load(store: &dyn DataStore, user: &CurrentUser, notices: &mut Notices) -> LocalList<Service> {
    let repo = ServiceRepository::new(store, &user.token, user.id());
    LocalList::new(loaded("Services", repo.list().await, notices))
}

fn render(
    user: &CurrentUser,
    services: &LocalList<Service>,
    notices: Notices,
    form: ServiceForm,
) -> ServicesTemplate {
    ServicesTemplate {
        layout: Layout::new("Services", "services", Some(user), notices),
        services: services
            .iter()
            .map(|s| ServiceRow {
                id: s.id,
                name: s.name.clone(),
                category: s.category.label(),
                base_price: s.base_price.to_string(),
                active: s.active,
            })
            .collect(),
        categories: category_options(&form.category),
        form,
    }
}

fn edit_page(user: &CurrentUser, notices: Notices, id: ServiceId, form: ServiceForm) -> ServiceEditTemplate {
    ServiceEditTemplate {
        layout: Layout::new("Edit service", "services", Some(user), notices),
        id,
        categories: category_options(&form.category),
        form,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List services.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> ServicesTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let services = load(state.store(), &user, &mut notices).await;
    render(&user, &services, notices, ServiceForm::default())
}

/// Create a service.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ServiceForm>,
) -> Response {
    let mut notices = Notices::new();

    let fields = match form.input().validate() {
        Ok(fields) => fields,
        Err(e) => {
            let services = load(state.store(), &user, &mut notices).await;
            notices.error(sentence(&e));
            return render(&user, &services, notices, form).into_response();
        }
    };

    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    match repo.create(&fields).await {
        Ok(service) => {
            tracing::info!(service_id = %service.id, "Service created");
            notices.success(format!("Service \"{}\" created.", service.name));
            flash_redirect(&session, notices, "/services").await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create service");
            let services = load(state.store(), &user, &mut notices).await;
            notices.error(e.user_message());
            render(&user, &services, notices, form).into_response()
        }
    }
}

/// Display the service edit form.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn edit(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
) -> Result<ServiceEditTemplate> {
    let mut notices = Notices::new();
    let services = load(state.store(), &user, &mut notices).await;
    let service = services
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;

    Ok(edit_page(&user, notices, id, ServiceForm::from_service(service)))
}

/// Save service edits.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ServiceId>,
    Form(form): Form<ServiceForm>,
) -> Response {
    let mut notices = Notices::new();
    let fields = match form.input().validate() {
        Ok(fields) => fields,
        Err(e) => {
            notices.error(sentence(&e));
            return edit_page(&user, notices, id, form).into_response();
        }
    };

    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    match repo.update(id, &fields).await {
        Ok(service) => {
            notices.success(format!("Service \"{}\" saved.", service.name));
            flash_redirect(&session, notices, "/services").await
        }
        Err(e) => {
            tracing::warn!(error = %e, service_id = %id, "Failed to update service");
            notices.error(e.user_message());
            edit_page(&user, notices, id, form).into_response()
        }
    }
}

/// Ask before deleting a service.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let services = load(state.store(), &user, &mut notices).await;
    let service = services
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete service", "services", Some(&user), notices),
        heading: "Delete service".to_string(),
        message: format!(
            "Delete the service \"{}\"? Existing work orders keep their lines.",
            service.name
        ),
        action: format!("/services/{id}/delete"),
        button: "Delete".to_string(),
        cancel: "/services".to_string(),
    })
}

/// Delete a service.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ServiceId>,
) -> Response {
    let mut notices = Notices::new();

    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    match repo.delete(id).await {
        Ok(service) => {
            tracing::info!(service_id = %id, "Service deleted");
            notices.success(format!("Service \"{}\" deleted.", service.name));
        }
        Err(e) => {
            tracing::warn!(error = %e, service_id = %id, "Failed to delete service");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, "/services").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unticked_checkbox_means_inactive() {
        let form = ServiceForm {
            name: "Crown".to_string(),
            base_price: "100".to_string(),
            category: "fixed_prosthesis".to_string(),
            active: None,
        };
        assert!(!form.input().active);
    }

    #[test]
    fn test_category_options_mark_selection() {
        let options = category_options("implants");
        let selected: Vec<_> = options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.first().map(|o| o.value.as_str()), Some("implants"));
    }
}
