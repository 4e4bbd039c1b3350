//! Per-order edits: header amendments, line removal and deletion.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{OrderEdit, WorkOrder, WorkOrderId, WorkOrderStatus};

use super::{OrderView, parse_date_field, status_options, today};
use crate::db::WorkOrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::{ConfirmTemplate, Layout, SelectOption, flash_redirect};
use crate::services::{Notices, WorkOrderBoard};
use crate::state::AppState;

/// Amendable order fields as typed.
#[derive(Debug, Clone, Deserialize)]
pub struct EditForm {
    #[serde(default)]
    pub patient: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub estimated_delivery: String,
    #[serde(default)]
    pub status: String,
}

impl EditForm {
    fn from_order(order: &WorkOrder) -> Self {
        Self {
            patient: order.patient.clone(),
            notes: order.notes.clone(),
            estimated_delivery: order.estimated_delivery.to_string(),
            status: order.status.as_str().to_string(),
        }
    }

    fn edit(&self) -> std::result::Result<OrderEdit, String> {
        let estimated_delivery = parse_date_field(&self.estimated_delivery)?
            .ok_or_else(|| "Enter an estimated delivery date.".to_string())?;
        let status: WorkOrderStatus = self
            .status
            .parse()
            .map_err(|e| crate::routes::sentence(&e))?;
        Ok(OrderEdit {
            patient: self.patient.clone(),
            notes: self.notes.clone(),
            estimated_delivery,
            status,
        })
    }
}

/// Order edit page.
#[derive(Template, WebTemplate)]
#[template(path = "work_orders/edit.html")]
pub struct OrderEditTemplate {
    pub layout: Layout,
    pub order: OrderView,
    pub statuses: Vec<SelectOption>,
    pub form: EditForm,
}

fn edit_page(
    user: &CurrentUser,
    board: &WorkOrderBoard,
    notices: Notices,
    order: &WorkOrder,
    form: EditForm,
) -> OrderEditTemplate {
    OrderEditTemplate {
        layout: Layout::new(
            format!("Work order for {}", order.patient),
            "work_orders",
            Some(user),
            notices,
        ),
        order: OrderView::new(order, board, today()),
        statuses: status_options(form.status.parse().ok()),
        form,
    }
}

fn find(board: &WorkOrderBoard, id: WorkOrderId) -> Result<&WorkOrder> {
    board
        .orders
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("work order {id}")))
}

/// Display the edit page.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn edit(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<WorkOrderId>,
) -> Result<OrderEditTemplate> {
    let mut notices = Notices::take_flash(&session).await;
    let board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    let order = find(&board, id)?;
    Ok(edit_page(&user, &board, notices, order, EditForm::from_order(order)))
}

/// Save patient, notes, delivery estimate and status together.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id()))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<WorkOrderId>,
    Form(form): Form<EditForm>,
) -> Result<Response> {
    let mut notices = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    find(&board, id)?;

    let edit = match form.edit() {
        Ok(edit) => edit,
        Err(message) => {
            notices.error(message);
            let order = find(&board, id)?;
            return Ok(edit_page(&user, &board, notices, order, form).into_response());
        }
    };

    let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
    match board.edit(&repo, id, edit).await {
        Ok(()) => {
            let mut outcome = Notices::new();
            outcome.success("Work order saved.");
            Ok(flash_redirect(&session, outcome, "/work-orders").await)
        }
        Err(e) => {
            tracing::warn!(error = %e, order_id = %id, "Failed to save work order");
            notices.error(e.user_message());
            let order = find(&board, id)?;
            Ok(edit_page(&user, &board, notices, order, form).into_response())
        }
    }
}

/// Remove one line and persist the new total.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn remove_line(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path((id, index)): Path<(WorkOrderId, usize)>,
) -> Result<Response> {
    let mut loading = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut loading).await;
    find(&board, id)?;

    let mut outcome = Notices::new();
    let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
    match board.remove_line(&repo, id, index).await {
        Ok(()) => outcome.success("Line removed."),
        Err(e) => {
            tracing::warn!(error = %e, order_id = %id, index, "Failed to remove line");
            outcome.error(e.user_message());
        }
    }

    Ok(flash_redirect(&session, outcome, &format!("/work-orders/{id}/edit")).await)
}

/// Ask before deleting an order.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<WorkOrderId>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    let order = find(&board, id)?;

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete work order", "work_orders", Some(&user), notices),
        heading: "Delete work order".to_string(),
        message: format!(
            "Delete the work order for {} created on {}? This cannot be undone.",
            order.patient, order.created_on
        ),
        action: format!("/work-orders/{id}/delete"),
        button: "Delete".to_string(),
        cancel: "/work-orders".to_string(),
    })
}

/// Delete an order.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<WorkOrderId>,
) -> Response {
    let mut loading = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut loading).await;

    let mut outcome = Notices::new();
    let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
    match board.delete(&repo, id).await {
        Ok(order) => outcome.success(format!("Work order for {} deleted.", order.patient)),
        Err(e) => {
            tracing::warn!(error = %e, order_id = %id, "Failed to delete work order");
            outcome.error(e.user_message());
        }
    }

    flash_redirect(&session, outcome, "/work-orders").await
}
