//! Administrative back-office.
//!
//! Every handler requires an administrator. Views span all accounts; only
//! user activation and deletion write anything.

mod records;
mod users;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{BackofficeStats, PlanShare, TextFilter, plan_by_id, plan_distribution};

use super::Layout;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::services::{BackofficeScreen, Notices};
use crate::state::AppState;

pub use records::{MembershipRow, MembershipsTemplate, PaymentRow, PaymentsTemplate};
pub use users::{UserRow, UsersTemplate};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/users", get(users::index))
        .route("/users/{id}/toggle", post(users::toggle))
        .route("/users/{id}/delete", get(users::confirm_delete).post(users::delete))
        .route("/memberships", get(records::memberships))
        .route("/payments", get(records::payments))
}

/// `?q=` free-text filter shared by the list pages.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

impl SearchQuery {
    fn filter(&self) -> TextFilter {
        TextFilter::new(&self.q)
    }
}

/// One bar of the plan distribution chart.
#[derive(Debug, Clone)]
pub struct PlanShareView {
    pub name: String,
    pub count: usize,
    pub percent: usize,
}

impl From<PlanShare> for PlanShareView {
    fn from(share: PlanShare) -> Self {
        Self {
            name: plan_by_id(&share.plan).map_or_else(|| share.plan.clone(), |p| p.name.to_string()),
            count: share.count,
            percent: share.percent,
        }
    }
}

/// Overview with headline figures.
#[derive(Template, WebTemplate)]
#[template(path = "admin/overview.html")]
pub struct OverviewTemplate {
    pub layout: Layout,
    pub stats: BackofficeStats,
    pub plans: Vec<PlanShareView>,
}

/// Back-office overview.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn overview(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> OverviewTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = BackofficeScreen::load(state.store(), &user, &mut notices).await;

    OverviewTemplate {
        stats: screen.stats(),
        plans: plan_distribution(&screen.memberships)
            .into_iter()
            .map(PlanShareView::from)
            .collect(),
        layout: Layout::new("Back-office", "admin", Some(&user), notices),
    }
}
