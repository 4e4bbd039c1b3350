//! Price list: services grouped by category with inline price edits.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{LocalList, Service, ServiceId, parse_price, price_list};

use super::{Layout, flash_redirect, sentence};
use crate::db::ServiceRepository;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::{Notices, loaded};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}/price", post(set_price))
        .route("/{id}/toggle", post(toggle))
}

#[derive(Debug, Deserialize)]
pub struct PriceForm {
    pub price: String,
}

/// One category section of the price list.
#[derive(Debug, Clone)]
pub struct PriceGroup {
    pub category: &'static str,
    pub services: Vec<Service>,
}

/// Price list template.
#[derive(Template, WebTemplate)]
#[template(path = "registry/pricing.html")]
pub struct PricingTemplate {
    pub layout: Layout,
    pub groups: Vec<PriceGroup>,
}

fn render(user: &CurrentUser, services: &LocalList<Service>, notices: Notices) -> PricingTemplate {
    PricingTemplate {
        layout: Layout::new("Price list", "pricing", Some(user), notices),
        groups: price_list(services.items())
            .into_iter()
            .map(|(category, entries)| PriceGroup {
                category: category.label(),
                services: entries.into_iter().cloned().collect(),
            })
            .collect(),
    }
}

async fn load(state: &AppState, user: &CurrentUser, notices: &mut Notices) -> LocalList<Service> {
    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    LocalList::new(loaded("Services", repo.list().await, notices))
}

/// Display the price list.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> PricingTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let services = load(&state, &user, &mut notices).await;
    render(&user, &services, notices)
}

/// Change one service's base price.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn set_price(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ServiceId>,
    Form(form): Form<PriceForm>,
) -> Response {
    let mut notices = Notices::new();

    match parse_price(&form.price) {
        Ok(price) => {
            let repo = ServiceRepository::new(state.store(), &user.token, user.id());
            match repo.set_price(id, price).await {
                Ok(service) => {
                    tracing::info!(service_id = %id, price = %price, "Service price updated");
                    notices.success(format!("Price of \"{}\" updated.", service.name));
                }
                Err(e) => {
                    tracing::warn!(error = %e, service_id = %id, "Failed to update price");
                    notices.error(e.user_message());
                }
            }
        }
        Err(e) => notices.error(sentence(&e)),
    }

    flash_redirect(&session, notices, "/pricing").await
}

/// Flip one service between active and inactive.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn toggle(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ServiceId>,
) -> Response {
    let mut loading = Notices::new();
    let services = load(&state, &user, &mut loading).await;
    let mut notices = Notices::new();

    let Some(active) = services.get(id).map(|s| s.active) else {
        notices.error("That service no longer exists. Reload the page.");
        return flash_redirect(&session, notices, "/pricing").await;
    };

    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    match repo.set_active(id, !active).await {
        Ok(service) => {
            let state_label = if service.active { "active" } else { "inactive" };
            notices.success(format!("\"{}\" is now {state_label}.", service.name));
        }
        Err(e) => {
            tracing::warn!(error = %e, service_id = %id, "Failed to toggle service");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, "/pricing").await
}
