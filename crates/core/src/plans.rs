//! Subscription plan catalogue.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::types::{CurrencyCode, Price};

/// A purchasable subscription plan and its resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Identifier stored on memberships and sent to the payment widget.
    pub id: &'static str,
    pub name: &'static str,
    pub price: Decimal,
    pub validity_days: u32,
    pub max_clinics: u32,
    pub max_dentists: u32,
    pub features: &'static [&'static str],
}

/// Every plan, cheapest first.
pub const PLANS: &[Plan] = &[
    Plan {
        id: "basic",
        name: "Basic",
        price: Decimal::from_parts(29, 0, 0, false, 0),
        validity_days: 30,
        max_clinics: 3,
        max_dentists: 10,
        features: &["Work orders and cart", "Price list", "Printable job sheets"],
    },
    Plan {
        id: "professional",
        name: "Professional",
        price: Decimal::from_parts(59, 0, 0, false, 0),
        validity_days: 30,
        max_clinics: 10,
        max_dentists: 50,
        features: &[
            "Everything in Basic",
            "Technician assignment",
            "Custom letterhead and logo",
        ],
    },
    Plan {
        id: "enterprise",
        name: "Enterprise",
        price: Decimal::from_parts(99, 0, 0, false, 0),
        validity_days: 30,
        max_clinics: 50,
        max_dentists: 250,
        features: &["Everything in Professional", "Priority support"],
    },
];

/// Look up a plan by identifier.
#[must_use]
pub fn plan_by_id(id: &str) -> Option<&'static Plan> {
    let id = id.trim();
    PLANS.iter().find(|plan| plan.id.eq_ignore_ascii_case(id))
}

impl Plan {
    /// The plan price in `currency`.
    #[must_use]
    pub const fn price_in(&self, currency: CurrencyCode) -> Price {
        Price::new(self.price, currency)
    }

    /// Last day of a membership starting on `start`.
    #[must_use]
    pub fn ends_on(&self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_days(Days::new(u64::from(self.validity_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lookup() {
        assert_eq!(plan_by_id("professional").unwrap().name, "Professional");
        assert_eq!(plan_by_id(" BASIC ").unwrap().id, "basic");
        assert!(plan_by_id("gold").is_none());
    }

    #[test]
    fn test_plans_are_ordered_by_price_and_limits() {
        for pair in PLANS.windows(2) {
            let [cheaper, dearer] = pair else { unreachable!() };
            assert!(cheaper.price < dearer.price);
            assert!(cheaper.max_clinics <= dearer.max_clinics);
            assert!(cheaper.max_dentists <= dearer.max_dentists);
        }
    }

    #[test]
    fn test_ends_on() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(
            plan_by_id("basic").unwrap().ends_on(start),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
        );
    }
}
