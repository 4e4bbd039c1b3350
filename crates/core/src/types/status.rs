//! Status and classification enums shared across entities.
//!
//! Wire values (the `serde` representation) are the values stored in the
//! hosted data store. `label()` is the human-facing text used by templates.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `Display` (wire value) and `FromStr` (wire value) for a
/// fieldless enum from a single variant table.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The value stored in the data store.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Work-order production status.
///
/// Transitions are unrestricted: any status may be set from any other
/// through an explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkOrderStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-production")]
    InProduction,
    #[serde(rename = "finished")]
    Finished,
    #[serde(rename = "delivered")]
    Delivered,
}

wire_enum!(WorkOrderStatus, "work order status", {
    Pending => "pending",
    InProduction => "in-production",
    Finished => "finished",
    Delivered => "delivered",
});

impl WorkOrderStatus {
    /// Human-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProduction => "In production",
            Self::Finished => "Finished",
            Self::Delivered => "Delivered",
        }
    }

    /// Whether the order still needs lab work (pending or in production).
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProduction)
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Client,
    Technician,
    Admin,
}

wire_enum!(UserRole, "user role", {
    Client => "client",
    Technician => "technician",
    Admin => "admin",
});

impl UserRole {
    /// Human-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Technician => "Technician",
            Self::Admin => "Administrator",
        }
    }
}

/// Fixed catalogue of service categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    FixedProsthesis,
    RemovableProsthesis,
    Implants,
    Orthodontics,
    Aesthetics,
    #[default]
    Other,
}

wire_enum!(ServiceCategory, "service category", {
    FixedProsthesis => "fixed_prosthesis",
    RemovableProsthesis => "removable_prosthesis",
    Implants => "implants",
    Orthodontics => "orthodontics",
    Aesthetics => "aesthetics",
    Other => "other",
});

impl ServiceCategory {
    /// Human-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FixedProsthesis => "Fixed prosthesis",
            Self::RemovableProsthesis => "Removable prosthesis",
            Self::Implants => "Implants",
            Self::Orthodontics => "Orthodontics",
            Self::Aesthetics => "Aesthetics",
            Self::Other => "Other",
        }
    }
}

/// Membership status. Values other than `active`/`expired` are kept
/// verbatim so the back-office can still show them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MembershipStatus {
    Active,
    Expired,
    Other(String),
}

impl MembershipStatus {
    /// The value stored in the data store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for MembershipStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => Self::Active,
            "expired" => Self::Expired,
            _ => Self::Other(s),
        }
    }
}

impl From<MembershipStatus> for String {
    fn from(status: MembershipStatus) -> Self {
        status.as_str().to_owned()
    }
}

/// Payment status. Unknown values are preserved like [`MembershipStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Other(String),
}

impl PaymentStatus {
    /// The value stored in the data store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            _ => Self::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_work_order_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&WorkOrderStatus::InProduction).unwrap(),
            "\"in-production\""
        );
        let parsed: WorkOrderStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(parsed, WorkOrderStatus::Delivered);
        assert_eq!(
            "in-production".parse::<WorkOrderStatus>().unwrap(),
            WorkOrderStatus::InProduction
        );
        assert!("shipped".parse::<WorkOrderStatus>().is_err());
    }

    #[test]
    fn test_work_order_status_open() {
        assert!(WorkOrderStatus::Pending.is_open());
        assert!(WorkOrderStatus::InProduction.is_open());
        assert!(!WorkOrderStatus::Finished.is_open());
        assert!(!WorkOrderStatus::Delivered.is_open());
    }

    #[test]
    fn test_display_matches_serde() {
        for status in WorkOrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        for category in ServiceCategory::ALL {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
        for role in UserRole::ALL {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn test_membership_status_preserves_unknown() {
        let status: MembershipStatus = serde_json::from_str("\"suspended\"").unwrap();
        assert_eq!(status, MembershipStatus::Other("suspended".to_owned()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"suspended\"");

        let active: MembershipStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(active, MembershipStatus::Active);
    }

    #[test]
    fn test_payment_status_round_trip() {
        let status: PaymentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
        assert_eq!(serde_json::to_string(&PaymentStatus::Pending).unwrap(), "\"pending\"");
    }
}
