//! Board listing, order creation, status changes and bulk finalize.

use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{OrderDraft, WorkOrderId, WorkOrderStatus, format_amount, parse_optional_id};

use super::{
    BoardQuery, DentistPickerTemplate, DraftForm, clear_draft, dentist_options, filter_query,
    load_cart, load_draft, parse_date_field, render_board, save_cart, save_draft, today,
};
use crate::db::{DentistRepository, WorkOrderRepository};
use crate::error::add_breadcrumb;
use crate::middleware::RequireAuth;
use crate::routes::{ConfirmTemplate, Layout, flash_redirect};
use crate::services::{Notices, WorkOrderBoard};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Clinic chosen in the compose form, and the dentist picked so far.
#[derive(Debug, Deserialize)]
pub struct PickerQuery {
    #[serde(default)]
    pub clinic_id: String,
    #[serde(default)]
    pub dentist_id: String,
}

fn board_path(query: &BoardQuery) -> String {
    format!("/work-orders{}", filter_query(&query.filter()))
}

impl DraftForm {
    /// Parse into a draft. Blank pickers become `None` and are reported by
    /// the draft's own checks.
    fn draft(&self) -> Result<OrderDraft, String> {
        Ok(OrderDraft {
            patient: self.patient.clone(),
            clinic_id: parse_optional_id(Some(self.clinic_id.as_str()))
                .map_err(|_| "Select a clinic for the order.".to_string())?,
            dentist_id: parse_optional_id(Some(self.dentist_id.as_str()))
                .map_err(|_| "Select a dentist for the order.".to_string())?,
            technician_id: parse_optional_id(Some(self.technician_id.as_str()))
                .map_err(|_| "Select a valid technician.".to_string())?,
            notes: self.notes.clone(),
            estimated_delivery: parse_date_field(&self.estimated_delivery)?,
        })
    }
}

/// Display the board.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
) -> Response {
    let mut notices = Notices::take_flash(&session).await;
    let board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    let cart = load_cart(&session).await;
    let filter = query.filter();

    let mut draft = load_draft(&session).await;
    if draft.clinic_id.trim().is_empty()
        && let Some(clinic) = filter.clinic
    {
        draft.clinic_id = clinic.to_string();
    }
    render_board(&user, &board, &cart, notices, &filter, draft).into_response()
}

/// Dentist options for the clinic chosen in the compose form.
#[instrument(skip(state, user, query), fields(user_id = %user.id()))]
pub async fn dentist_picker(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<PickerQuery>,
) -> Response {
    let clinic = parse_optional_id(Some(query.clinic_id.as_str())).ok().flatten();
    let repo = DentistRepository::new(state.store(), &user.token, user.id());
    let dentists = match repo.list().await {
        Ok(dentists) => dentists,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load dentists for picker");
            Vec::new()
        }
    };
    DentistPickerTemplate {
        dentists: dentist_options(&dentists, clinic, &query.dentist_id),
    }
    .into_response()
}

/// Save the composed order.
///
/// The cart and the draft header are cleared only once the store has
/// accepted the order. A rejected order re-renders the form as typed.
#[instrument(skip(state, session, user, query, form), fields(user_id = %user.id()))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
    Form(form): Form<DraftForm>,
) -> Response {
    let mut notices = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    let mut cart = load_cart(&session).await;
    let filter = query.filter();

    save_draft(&session, &form).await;
    let draft = match form.draft() {
        Ok(draft) => draft,
        Err(message) => {
            notices.error(message);
            return render_board(&user, &board, &cart, notices, &filter, form).into_response();
        }
    };

    let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
    match board.create(&repo, draft, &cart, today()).await {
        Ok(id) => {
            let total = board.orders.get(id).map(|o| o.total).unwrap_or_default();
            let mut outcome = Notices::new();
            outcome.success(format!(
                "Work order for {} saved. Total {}.",
                form.patient.trim(),
                format_amount(total)
            ));
            let order_id = id.to_string();
            add_breadcrumb(
                "work_orders",
                "Work order created",
                Some(&[("order_id", order_id.as_str())]),
            );

            cart.clear();
            if let Err(e) = save_cart(&session, &cart).await {
                tracing::warn!(error = %e, "Failed to clear cart");
            }
            clear_draft(&session).await;
            flash_redirect(&session, outcome, &board_path(&query)).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Work order rejected");
            notices.error(e.user_message());
            render_board(&user, &board, &cart, notices, &filter, form).into_response()
        }
    }
}

/// Change one order's status.
#[instrument(skip(state, session, user, query, form), fields(user_id = %user.id()))]
pub async fn set_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<WorkOrderId>,
    Query(query): Query<BoardQuery>,
    Form(form): Form<StatusForm>,
) -> Response {
    let mut loading = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut loading).await;
    let mut outcome = Notices::new();

    match form.status.parse::<WorkOrderStatus>() {
        Ok(status) => {
            let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
            match board.set_status(&repo, id, status).await {
                Ok(()) => outcome.success(format!("Status changed to {}.", status.label())),
                Err(e) => {
                    tracing::warn!(error = %e, order_id = %id, "Failed to change status");
                    outcome.error(e.user_message());
                }
            }
        }
        Err(e) => outcome.error(crate::routes::sentence(&e)),
    }

    flash_redirect(&session, outcome, &board_path(&query)).await
}

/// Ask before finalizing the open orders of the filtered clinic.
///
/// With nothing to finalize the board is shown with an informational notice
/// instead.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn confirm_finalize(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
) -> Response {
    let mut notices = Notices::new();
    let board = WorkOrderBoard::load(state.store(), &user, &mut notices).await;
    let filter = query.filter();

    let Some(clinic) = filter.clinic else {
        notices.error("Select a clinic to finalize its orders.");
        let cart = load_cart(&session).await;
        let draft = load_draft(&session).await;
        return render_board(&user, &board, &cart, notices, &filter, draft).into_response();
    };

    let count = board.finalize_candidates(clinic).len();
    let clinic_name = board
        .directory
        .clinic_name(clinic)
        .unwrap_or("this clinic")
        .to_string();
    if count == 0 {
        notices.info(format!(
            "{clinic_name} has no pending or in-production orders to finalize."
        ));
        let cart = load_cart(&session).await;
        let draft = load_draft(&session).await;
        return render_board(&user, &board, &cart, notices, &filter, draft).into_response();
    }

    let noun = if count == 1 { "order" } else { "orders" };
    ConfirmTemplate {
        layout: Layout::new("Finalize orders", "work_orders", Some(&user), notices),
        heading: "Finalize orders".to_string(),
        message: format!(
            "Mark {count} open {noun} of {clinic_name} as finished?"
        ),
        action: format!("/work-orders/finalize{}", filter_query(&filter)),
        button: "Finalize".to_string(),
        cancel: format!("/work-orders{}", filter_query(&filter)),
    }
    .into_response()
}

/// Finalize the open orders of the filtered clinic.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn finalize(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
) -> Response {
    let mut loading = Notices::new();
    let mut board = WorkOrderBoard::load(state.store(), &user, &mut loading).await;
    let mut outcome = Notices::new();

    if let Some(clinic) = query.filter().clinic {
        let repo = WorkOrderRepository::new(state.store(), &user.token, user.id());
        match board.finalize(&repo, clinic).await {
            Ok(0) => outcome.info("There were no open orders to finalize."),
            Ok(1) => outcome.success("1 order marked as finished."),
            Ok(n) => outcome.success(format!("{n} orders marked as finished.")),
            Err(e) => {
                tracing::warn!(error = %e, clinic_id = %clinic, "Bulk finalize failed");
                outcome.error(e.user_message());
            }
        }
    } else {
        outcome.error("Select a clinic to finalize its orders.");
    }

    flash_redirect(&session, outcome, &board_path(&query)).await
}
