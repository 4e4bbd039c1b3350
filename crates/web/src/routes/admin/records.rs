//! Read-only membership and payment listings.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{Membership, Payment, completed_revenue, format_amount, plan_by_id};

use super::SearchQuery;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::routes::Layout;
use crate::services::{BackofficeScreen, Notices};
use crate::state::AppState;

/// One membership in the table.
#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub plan: String,
    pub owner: String,
    pub starts_on: String,
    pub ends_on: String,
    pub status: String,
    pub price: String,
    pub limits: String,
    pub days_left: i64,
}

impl MembershipRow {
    fn new(membership: &Membership, owner: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            plan: plan_by_id(&membership.plan)
                .map_or_else(|| membership.plan.clone(), |p| p.name.to_string()),
            owner: owner.unwrap_or("(unknown user)").to_string(),
            starts_on: membership.starts_on.to_string(),
            ends_on: membership.ends_on.to_string(),
            status: membership.status.as_str().to_string(),
            price: format_amount(membership.price),
            limits: format!(
                "{} clinics, {} dentists",
                membership.max_clinics, membership.max_dentists
            ),
            days_left: membership.days_remaining(now),
        }
    }

    #[must_use]
    pub const fn is_lapsed(&self) -> bool {
        self.days_left < 0
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/memberships.html")]
pub struct MembershipsTemplate {
    pub layout: Layout,
    pub memberships: Vec<MembershipRow>,
    pub query: String,
}

/// Memberships, filtered by plan, status or owner email.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn memberships(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> MembershipsTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = BackofficeScreen::load(state.store(), &user, &mut notices).await;
    let filter = query.filter();
    let now = Utc::now();

    MembershipsTemplate {
        memberships: screen
            .memberships
            .iter()
            .filter_map(|m| {
                let owner = screen.owner_email(m.user_id);
                filter
                    .matches_membership(m, owner)
                    .then(|| MembershipRow::new(m, owner, now))
            })
            .collect(),
        query: filter.as_str().to_string(),
        layout: Layout::new("Memberships", "admin", Some(&user), notices),
    }
}

/// One payment in the table.
#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub reference: String,
    pub amount: String,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub paid_at: String,
    pub payer: String,
}

impl PaymentRow {
    fn new(payment: &Payment, screen: &BackofficeScreen) -> Self {
        Self {
            reference: payment.reference.clone(),
            amount: format_amount(payment.amount),
            currency: payment.currency.clone(),
            method: payment.method.clone(),
            status: payment.status.as_str().to_string(),
            paid_at: payment
                .paid_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            payer: payment
                .user_id
                .and_then(|id| screen.owner_email(id))
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/payments.html")]
pub struct PaymentsTemplate {
    pub layout: Layout,
    pub payments: Vec<PaymentRow>,
    pub query: String,
    /// Completed revenue over the listed payments.
    pub revenue: String,
}

/// Payments, filtered by reference code.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn payments(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> PaymentsTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = BackofficeScreen::load(state.store(), &user, &mut notices).await;
    let filter = query.filter();

    let matching: Vec<&Payment> = screen
        .payments
        .iter()
        .filter(|p| filter.matches_payment(p))
        .collect();

    PaymentsTemplate {
        revenue: format_amount(completed_revenue(matching.iter().copied())),
        payments: matching.iter().map(|p| PaymentRow::new(p, &screen)).collect(),
        query: filter.as_str().to_string(),
        layout: Layout::new("Payments", "admin", Some(&user), notices),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    use dentalab_core::{MembershipId, MembershipStatus, UserId};

    use super::*;

    #[test]
    fn test_membership_row_counts_days_left() {
        let membership = Membership {
            id: MembershipId::generate(),
            user_id: UserId::generate(),
            plan: "professional".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            max_clinics: 10,
            max_dentists: 50,
            status: MembershipStatus::Active,
            price: Decimal::new(59, 0),
        };
        let now = Utc.with_ymd_and_hms(2026, 3, 21, 12, 0, 0).unwrap();
        let row = MembershipRow::new(&membership, Some("lab@example.com"), now);
        assert_eq!(row.plan, "Professional");
        assert_eq!(row.days_left, 10);
        assert!(!row.is_lapsed());
        assert_eq!(row.limits, "10 clinics, 50 dentists");
    }
}
