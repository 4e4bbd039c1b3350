//! Public landing page: product pitch, plans and the payment widget.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;

use dentalab_core::{PLANS, Plan, format_amount};

use super::Layout;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::services::Notices;
use crate::state::AppState;

/// Plan card view.
#[derive(Debug, Clone)]
pub struct PlanView {
    pub id: &'static str,
    pub name: &'static str,
    /// Formatted amount, e.g. `59.00`.
    pub price: String,
    /// Amount as sent to the payment widget, e.g. `59.00`.
    pub amount: String,
    pub validity_days: u32,
    pub max_clinics: u32,
    pub max_dentists: u32,
    pub features: &'static [&'static str],
}

impl From<&Plan> for PlanView {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            price: format_amount(plan.price),
            amount: format!("{:.2}", plan.price),
            validity_days: plan.validity_days,
            max_clinics: plan.max_clinics,
            max_dentists: plan.max_dentists,
            features: plan.features,
        }
    }
}

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "landing.html")]
pub struct LandingTemplate {
    pub layout: Layout,
    pub plans: Vec<PlanView>,
    /// Payment widget client ID; the widget is hidden when unset.
    pub payment_client_id: Option<String>,
    pub currency: &'static str,
}

/// Display the landing page.
pub async fn index(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
) -> LandingTemplate {
    let notices = Notices::take_flash(&session).await;
    let payment = &state.config().payment;

    LandingTemplate {
        layout: Layout::new("Dental lab management", "home", user.as_ref(), notices),
        plans: PLANS.iter().map(PlanView::from).collect(),
        payment_client_id: payment.client_id.clone(),
        currency: payment.currency.code(),
    }
}
