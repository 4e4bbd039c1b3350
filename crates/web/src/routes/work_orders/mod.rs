//! Work-order route handlers.
//!
//! The board (`board`) lists and composes orders, `cart` edits the
//! session-held line items of the order being composed, `actions` covers
//! per-order edits, and `report` renders the printable job sheet.

mod actions;
mod board;
mod cart;
mod report;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use dentalab_core::{
    Cart, ClinicId, Dentist, LineItem, OrderFilter, WorkOrder, WorkOrderId, WorkOrderStatus,
    default_delivery, format_amount, parse_optional_id,
};

use super::{Layout, SelectOption};
use crate::filters;
use crate::models::{CurrentUser, session::keys};
use crate::services::{Notices, WorkOrderBoard};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(board::index).post(board::create))
        .route("/dentists", get(board::dentist_picker))
        .route("/cart/add", post(cart::add))
        .route("/cart/remove", post(cart::remove))
        .route("/cart/clear", post(cart::clear))
        .route(
            "/finalize",
            get(board::confirm_finalize).post(board::finalize),
        )
        .route("/{id}", post(actions::update))
        .route("/{id}/status", post(board::set_status))
        .route("/{id}/edit", get(actions::edit))
        .route("/{id}/lines/{index}/delete", post(actions::remove_line))
        .route(
            "/{id}/delete",
            get(actions::confirm_delete).post(actions::delete),
        )
        .route("/{id}/report", get(report::report))
}

// =============================================================================
// Query and form data
// =============================================================================

/// Board filters, carried in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardQuery {
    pub clinic_id: Option<String>,
    pub status: Option<String>,
}

impl BoardQuery {
    /// Parse into a filter. Unparseable values are ignored.
    #[must_use]
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            clinic: parse_optional_id(self.clinic_id.as_deref()).ok().flatten(),
            status: self
                .status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// Query string that reproduces a filter, including the leading `?`.
#[must_use]
pub fn filter_query(filter: &OrderFilter) -> String {
    let mut pairs = Vec::new();
    if let Some(clinic) = filter.clinic {
        pairs.push(format!("clinic_id={clinic}"));
    }
    if let Some(status) = filter.status {
        pairs.push(format!("status={status}"));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Draft order header from the compose form.
///
/// Kept in the session between cart actions so the header survives every
/// round trip until the order is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftForm {
    #[serde(default)]
    pub patient: String,
    #[serde(default)]
    pub clinic_id: String,
    #[serde(default)]
    pub dentist_id: String,
    #[serde(default)]
    pub technician_id: String,
    #[serde(default)]
    pub notes: String,
    /// Optional `YYYY-MM-DD` override of the default delivery estimate.
    #[serde(default)]
    pub estimated_delivery: String,
}

/// Parse an optional `YYYY-MM-DD` date field.
///
/// # Errors
///
/// Returns a notice message for non-blank input that is not a date.
pub fn parse_date_field(raw: &str) -> Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("\"{raw}\" is not a valid date."))
}

// =============================================================================
// Cart storage
// =============================================================================

/// The cart of the order being composed.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart from session");
            Cart::default()
        }
    }
}

/// Persist the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// The header typed so far for the order being composed.
pub async fn load_draft(session: &Session) -> DraftForm {
    match session.get::<DraftForm>(keys::DRAFT).await {
        Ok(draft) => draft.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read order draft from session");
            DraftForm::default()
        }
    }
}

/// Remember the header typed so far. Failures are logged only.
pub async fn save_draft(session: &Session, draft: &DraftForm) {
    if let Err(e) = session.insert(keys::DRAFT, draft).await {
        tracing::warn!(error = %e, "Failed to save order draft");
    }
}

/// Forget the draft header once its order is saved.
pub async fn clear_draft(session: &Session) {
    if let Err(e) = session.remove::<DraftForm>(keys::DRAFT).await {
        tracing::warn!(error = %e, "Failed to clear order draft");
    }
}

// =============================================================================
// View models
// =============================================================================

/// Today in the server's reference timezone.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Work-order card on the board.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: WorkOrderId,
    pub patient: String,
    pub clinic: String,
    pub dentist: String,
    pub technician: String,
    pub lines: Vec<LineItem>,
    pub total: String,
    pub status: WorkOrderStatus,
    pub statuses: Vec<SelectOption>,
    pub created_on: NaiveDate,
    pub estimated_delivery: NaiveDate,
    /// Days until delivery; negative once overdue.
    pub days_left: i64,
    pub notes: String,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &WorkOrder, board: &WorkOrderBoard, today: NaiveDate) -> Self {
        let directory = &board.directory;
        Self {
            id: order.id,
            patient: order.patient.clone(),
            clinic: directory
                .clinic_name(order.clinic_id)
                .unwrap_or("Unknown clinic")
                .to_string(),
            dentist: directory
                .dentist_name(order.dentist_id)
                .unwrap_or("Unknown dentist")
                .to_string(),
            technician: order
                .technician_id
                .and_then(|t| board.technicians.iter().find(|x| x.id == t))
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            lines: order.lines.clone(),
            total: format_amount(order.total),
            status: order.status,
            statuses: status_options(Some(order.status)),
            created_on: order.created_on,
            estimated_delivery: order.estimated_delivery,
            days_left: order.days_until_delivery(today),
            notes: order.notes.clone(),
        }
    }

    #[must_use]
    pub fn is_overdue(&self) -> bool {
        self.days_left < 0 && self.status.is_open()
    }
}

/// One per-status counter.
#[derive(Debug, Clone)]
pub struct CountView {
    pub label: &'static str,
    pub value: &'static str,
    pub count: usize,
}

/// A cart line with its position.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub index: usize,
    pub line: LineItem,
}

/// The cart as shown under the compose form.
#[derive(Debug, Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: String,
    /// Board filters, so cart forms return to the same view.
    pub query: String,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, query: String) -> Self {
        Self {
            lines: cart
                .lines()
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, line)| CartLineView { index, line })
                .collect(),
            total: format_amount(cart.total()),
            query,
        }
    }
}

/// Work-order board.
#[derive(Template, WebTemplate)]
#[template(path = "work_orders/board.html")]
pub struct BoardTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderView>,
    pub counts: Vec<CountView>,
    pub open_count: usize,
    /// Clinic filter choices.
    pub clinic_filter: Vec<SelectOption>,
    /// Status filter choices.
    pub status_filter: Vec<SelectOption>,
    /// Selected clinic, offered for bulk finalize.
    pub filtered_clinic: Option<ClinicId>,
    /// Current filters as a query string, for form targets.
    pub query: String,
    pub cart: CartView,
    pub services: Vec<SelectOption>,
    pub clinics: Vec<SelectOption>,
    pub dentists: Vec<SelectOption>,
    pub technicians: Vec<SelectOption>,
    pub draft: DraftForm,
    pub default_delivery: NaiveDate,
}

/// Dentist picker of the compose form, swapped in when the clinic changes.
#[derive(Template, WebTemplate)]
#[template(path = "work_orders/_dentists.html")]
pub struct DentistPickerTemplate {
    pub dentists: Vec<SelectOption>,
}

/// Dentists of `clinic`, or all of them when no clinic is chosen.
#[must_use]
pub fn dentist_options(
    dentists: &[Dentist],
    clinic: Option<ClinicId>,
    selected: &str,
) -> Vec<SelectOption> {
    dentists
        .iter()
        .filter(|d| clinic.is_none_or(|c| d.clinic_id == c))
        .map(|d| SelectOption::new(d.id, d.name.clone(), d.id.to_string() == selected.trim()))
        .collect()
}

/// Status choices, one selected.
#[must_use]
pub fn status_options(selected: Option<WorkOrderStatus>) -> Vec<SelectOption> {
    WorkOrderStatus::ALL
        .iter()
        .map(|s| SelectOption::new(s.as_str(), s.label(), Some(*s) == selected))
        .collect()
}

/// Render the board from its post-mutation local state.
#[must_use]
pub fn render_board(
    user: &CurrentUser,
    board: &WorkOrderBoard,
    cart: &Cart,
    notices: Notices,
    filter: &OrderFilter,
    draft: DraftForm,
) -> BoardTemplate {
    let today = today();
    let directory = &board.directory;
    let counts = board.counts();
    let query = filter_query(filter);

    // The dentist picker follows the draft's clinic, else the filtered one.
    let picker_clinic: Option<ClinicId> = parse_optional_id(Some(draft.clinic_id.as_str()))
        .ok()
        .flatten()
        .or(filter.clinic);
    let draft_clinic = picker_clinic.map(|c| c.to_string()).unwrap_or_default();

    BoardTemplate {
        layout: Layout::new("Work orders", "work_orders", Some(user), notices),
        orders: board
            .filtered(filter)
            .map(|o| OrderView::new(o, board, today))
            .collect(),
        counts: WorkOrderStatus::ALL
            .iter()
            .map(|s| CountView {
                label: s.label(),
                value: s.as_str(),
                count: counts.get(*s),
            })
            .collect(),
        open_count: counts.open(),
        clinic_filter: directory
            .clinics
            .iter()
            .map(|c| SelectOption::new(c.id, c.name.clone(), Some(c.id) == filter.clinic))
            .collect(),
        status_filter: status_options(filter.status),
        filtered_clinic: filter.clinic,
        cart: CartView::new(cart, query.clone()),
        query,
        services: board
            .services
            .iter()
            .filter(|s| s.active)
            .map(|s| {
                SelectOption::new(
                    s.id,
                    format!("{} ({})", s.name, format_amount(s.base_price)),
                    false,
                )
            })
            .collect(),
        clinics: directory
            .clinics
            .iter()
            .map(|c| SelectOption::new(c.id, c.name.clone(), c.id.to_string() == draft_clinic))
            .collect(),
        dentists: dentist_options(directory.dentists.items(), picker_clinic, &draft.dentist_id),
        technicians: board
            .technicians
            .iter()
            .filter(|t| t.active)
            .map(|t| {
                SelectOption::new(t.id, t.name.clone(), t.id.to_string() == draft.technician_id)
            })
            .collect(),
        default_delivery: default_delivery(today),
        draft,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_board_query_ignores_garbage() {
        let query = BoardQuery {
            clinic_id: Some("not-a-uuid".to_string()),
            status: Some("delivered".to_string()),
        };
        let filter = query.filter();
        assert_eq!(filter.clinic, None);
        assert_eq!(filter.status, Some(WorkOrderStatus::Delivered));
    }

    #[test]
    fn test_filter_query_round_trips_status() {
        let filter = OrderFilter {
            clinic: None,
            status: Some(WorkOrderStatus::InProduction),
        };
        assert_eq!(filter_query(&filter), "?status=in-production");
        assert_eq!(filter_query(&OrderFilter::default()), "");
    }

    #[test]
    fn test_dentist_options_follow_the_clinic() {
        let owner = dentalab_core::UserId::generate();
        let smile = ClinicId::generate();
        let other = ClinicId::generate();
        let dentist = |clinic: ClinicId, name: &str| Dentist {
            id: dentalab_core::DentistId::generate(),
            owner,
            clinic_id: clinic,
            name: name.to_string(),
            specialty: String::new(),
        };
        let dentists = vec![dentist(smile, "Dr. X"), dentist(other, "Dr. Y")];
        let chosen = dentists[0].id.to_string();

        let at_smile = dentist_options(&dentists, Some(smile), &chosen);
        assert_eq!(at_smile.len(), 1);
        assert_eq!(at_smile[0].label, "Dr. X");
        assert!(at_smile[0].selected);

        assert_eq!(dentist_options(&dentists, None, "").len(), 2);
    }

    #[test]
    fn test_parse_date_field() {
        assert_eq!(parse_date_field("  "), Ok(None));
        assert_eq!(
            parse_date_field("2026-03-01"),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 1))
        );
        assert!(parse_date_field("01/03/2026").is_err());
    }
}
