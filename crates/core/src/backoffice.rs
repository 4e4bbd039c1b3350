//! Administrative back-office: users, memberships and payments across all
//! accounts, plus the statistics derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::local::Record;
use crate::types::{MembershipId, MembershipStatus, PaymentId, PaymentStatus, UserId, UserRole};

const SECONDS_PER_DAY: i64 = 86_400;

/// Application profile of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub lab_name: String,
    pub active: bool,
    pub registered_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

impl Record for UserProfile {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// A subscription record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub plan: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub max_clinics: u32,
    pub max_dentists: u32,
    pub status: MembershipStatus,
    pub price: Decimal,
}

impl Record for Membership {
    type Id = MembershipId;

    fn id(&self) -> MembershipId {
        self.id
    }
}

impl Membership {
    /// See [`days_remaining`].
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        days_remaining(self.ends_on, now)
    }
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub membership_id: Option<MembershipId>,
}

impl Record for Payment {
    type Id = PaymentId;

    fn id(&self) -> PaymentId {
        self.id
    }
}

/// Whole days from `now` until the start of `ends_on` (UTC), rounded up.
///
/// An end date ten days out yields 10; an end date in the past yields a
/// negative number.
#[must_use]
pub fn days_remaining(ends_on: NaiveDate, now: DateTime<Utc>) -> i64 {
    let end = ends_on.and_time(chrono::NaiveTime::MIN).and_utc();
    let seconds = (end - now).num_seconds();
    let whole = seconds.div_euclid(SECONDS_PER_DAY);
    if seconds.rem_euclid(SECONDS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Headline figures on the admin overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackofficeStats {
    pub total_users: usize,
    pub active_users: usize,
    pub active_memberships: usize,
    /// Sum of completed payment amounts.
    pub revenue: Decimal,
    pub open_work_orders: usize,
}

impl BackofficeStats {
    #[must_use]
    pub fn compute(
        users: &[UserProfile],
        memberships: &[Membership],
        payments: &[Payment],
        open_work_orders: usize,
    ) -> Self {
        Self {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.active).count(),
            active_memberships: memberships
                .iter()
                .filter(|m| m.status == MembershipStatus::Active)
                .count(),
            revenue: completed_revenue(payments),
            open_work_orders,
        }
    }
}

/// Sum of amounts over completed payments.
#[must_use]
pub fn completed_revenue<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Decimal {
    payments
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

/// Memberships on one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanShare {
    pub plan: String,
    pub count: usize,
    /// Rounded share of all memberships, 0-100.
    pub percent: usize,
}

/// Count memberships per plan, most popular first.
#[must_use]
pub fn plan_distribution(memberships: &[Membership]) -> Vec<PlanShare> {
    let mut shares: Vec<PlanShare> = Vec::new();
    for membership in memberships {
        match shares.iter_mut().find(|s| s.plan == membership.plan) {
            Some(share) => share.count += 1,
            None => shares.push(PlanShare {
                plan: membership.plan.clone(),
                count: 1,
                percent: 0,
            }),
        }
    }

    let total = memberships.len();
    for share in &mut shares {
        share.percent = (share.count * 100 + total / 2) / total.max(1);
    }
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.plan.cmp(&b.plan)));
    shares
}

/// Case-insensitive substring filter over a few text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFilter {
    needle: String,
}

impl TextFilter {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            needle: raw.trim().to_lowercase(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.needle
    }

    /// Whether any field contains the needle. An empty filter matches all.
    #[must_use]
    pub fn matches(&self, fields: &[&str]) -> bool {
        self.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&self.needle))
    }

    /// Name, email or lab name.
    #[must_use]
    pub fn matches_user(&self, user: &UserProfile) -> bool {
        self.matches(&[&user.name, &user.email, &user.lab_name])
    }

    /// Payment reference code.
    #[must_use]
    pub fn matches_payment(&self, payment: &Payment) -> bool {
        self.matches(&[&payment.reference])
    }

    /// Plan or status, plus the owner's email when known.
    #[must_use]
    pub fn matches_membership(&self, membership: &Membership, owner_email: Option<&str>) -> bool {
        self.matches(&[
            &membership.plan,
            membership.status.as_str(),
            owner_email.unwrap_or_default(),
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn user(name: &str, email: &str, active: bool) -> UserProfile {
        UserProfile {
            id: UserId::generate(),
            email: email.to_owned(),
            name: name.to_owned(),
            role: UserRole::Client,
            lab_name: "Dental Works".to_owned(),
            active,
            registered_at: None,
        }
    }

    fn membership(plan: &str, status: MembershipStatus) -> Membership {
        Membership {
            id: MembershipId::generate(),
            user_id: UserId::generate(),
            plan: plan.to_owned(),
            starts_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            max_clinics: 3,
            max_dentists: 10,
            status,
            price: Decimal::new(29, 0),
        }
    }

    fn payment(reference: &str, amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: PaymentId::generate(),
            reference: reference.to_owned(),
            amount: Decimal::new(amount, 0),
            currency: "USD".to_owned(),
            method: "paypal".to_owned(),
            status,
            paid_at: None,
            user_id: None,
            membership_id: None,
        }
    }

    #[test]
    fn test_days_remaining_ten_days_out() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap();
        let ends_on = now.date_naive() + Duration::days(10);
        assert_eq!(days_remaining(ends_on, now), 10);

        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(days_remaining(ends_on, midnight), 10);
    }

    #[test]
    fn test_days_remaining_past_is_negative() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let ends_on = now.date_naive() - Duration::days(3);
        assert!(days_remaining(ends_on, now) < 0);
        assert_eq!(days_remaining(ends_on, now), -3);
    }

    #[test]
    fn test_stats() {
        let users = vec![
            user("Ana", "ana@lab.example", true),
            user("Bo", "bo@lab.example", false),
        ];
        let memberships = vec![
            membership("basic", MembershipStatus::Active),
            membership("basic", MembershipStatus::Expired),
        ];
        let payments = vec![
            payment("PAY-1", 29, PaymentStatus::Completed),
            payment("PAY-2", 59, PaymentStatus::Pending),
            payment("PAY-3", 59, PaymentStatus::Completed),
        ];

        let stats = BackofficeStats::compute(&users, &memberships, &payments, 4);

        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.active_memberships, 1);
        assert_eq!(stats.revenue, Decimal::new(88, 0));
        assert_eq!(stats.open_work_orders, 4);
    }

    #[test]
    fn test_plan_distribution() {
        let memberships = vec![
            membership("professional", MembershipStatus::Active),
            membership("basic", MembershipStatus::Active),
            membership("basic", MembershipStatus::Expired),
        ];

        let shares = plan_distribution(&memberships);

        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].plan, "basic");
        assert_eq!(shares[0].count, 2);
        assert_eq!(shares[0].percent, 67);
        assert_eq!(shares[1].percent, 33);
        assert!(plan_distribution(&[]).is_empty());
    }

    #[test]
    fn test_text_filter() {
        let ana = user("Ana Ruiz", "ana@lab.example", true);
        assert!(TextFilter::new("").matches_user(&ana));
        assert!(TextFilter::new(" RUIZ ").matches_user(&ana));
        assert!(TextFilter::new("dental works").matches_user(&ana));
        assert!(!TextFilter::new("zeta").matches_user(&ana));

        let pay = payment("PAY-7781", 29, PaymentStatus::Completed);
        assert!(TextFilter::new("7781").matches_payment(&pay));
        assert!(!TextFilter::new("9999").matches_payment(&pay));
    }
}
