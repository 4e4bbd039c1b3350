//! Printable job sheet for one work order.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;

use dentalab_core::{LabConfig, TaxPreview, TaxSettings, WorkOrderId};

use super::{OrderView, today};
use crate::db::LabConfigRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::Layout;
use crate::services::{Notices, WorkOrderBoard};
use crate::state::AppState;

/// Job sheet template.
#[derive(Template, WebTemplate)]
#[template(path = "work_orders/report.html")]
pub struct ReportTemplate {
    pub layout: Layout,
    pub order: OrderView,
    /// Letterhead; absent until the lab has saved its configuration.
    pub lab: Option<LabConfig>,
    pub tax: TaxPreview,
}

/// Render the job sheet with the lab letterhead and tax breakdown.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn report(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<WorkOrderId>,
) -> Result<ReportTemplate> {
    let mut notices = Notices::new();
    let config_repo = LabConfigRepository::new(state.store(), &user.token, user.id());

    let (board, config) = tokio::join!(
        WorkOrderBoard::load(state.store(), &user, &mut notices),
        config_repo.get(),
    );

    let lab = match config {
        Ok(lab) => lab,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load lab configuration for report");
            notices.warning(format!(
                "The lab letterhead could not be loaded: {}",
                e.user_message()
            ));
            None
        }
    };

    let order = board
        .orders
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("work order {id}")))?;
    let tax = lab
        .as_ref()
        .map_or_else(TaxSettings::default, |l| l.tax)
        .apply(order.total);

    Ok(ReportTemplate {
        layout: Layout::new(
            format!("Job sheet: {}", order.patient),
            "work_orders",
            Some(&user),
            notices,
        ),
        order: OrderView::new(order, &board, today()),
        lab,
        tax,
    })
}
