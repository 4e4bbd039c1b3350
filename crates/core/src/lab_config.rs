//! Per-user lab letterhead and tax settings.
//!
//! Tax is shown on reports as a deduction: `tax = subtotal × percent / 100`
//! and `total = subtotal − tax`.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Email, EmailError, LabConfigId, UnknownVariant, UserId};

/// Subtotal used by the settings preview panel.
pub const PREVIEW_SUBTOTAL: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// Validation failures for the settings form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabConfigError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("tax percentage must be a number between 0 and 100, got \"{0}\"")]
    InvalidPercent(String),

    #[error(transparent)]
    UnknownTaxMode(#[from] UnknownVariant),
}

/// Which tax the lab applies on its reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Value-added tax.
    #[default]
    Vat,
    /// Withholding tax.
    Withholding,
}

impl TaxMode {
    pub const ALL: &'static [Self] = &[Self::Vat, Self::Withholding];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vat => "vat",
            Self::Withholding => "withholding",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Vat => "VAT",
            Self::Withholding => "Withholding",
        }
    }

    /// Percentage the form snaps to when this mode is selected.
    #[must_use]
    pub const fn default_percent(&self) -> Decimal {
        match self {
            Self::Vat => Decimal::from_parts(19, 0, 0, false, 0),
            Self::Withholding => Decimal::from_parts(145, 0, 0, false, 1),
        }
    }
}

impl fmt::Display for TaxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "vat" => Ok(Self::Vat),
            "withholding" => Ok(Self::Withholding),
            other => Err(UnknownVariant {
                kind: "tax mode",
                value: other.to_owned(),
            }),
        }
    }
}

/// Tax mode plus its (independently editable) percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    pub mode: TaxMode,
    pub percent: Decimal,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self::for_mode(TaxMode::default())
    }
}

impl TaxSettings {
    /// Settings with the mode's default percentage.
    #[must_use]
    pub const fn for_mode(mode: TaxMode) -> Self {
        Self {
            mode,
            percent: mode.default_percent(),
        }
    }

    /// Select a mode, snapping the percentage to its default.
    pub const fn select_mode(&mut self, mode: TaxMode) {
        *self = Self::for_mode(mode);
    }

    /// Keep a manually typed percentage.
    pub const fn set_percent(&mut self, percent: Decimal) {
        self.percent = percent;
    }

    /// Resolve the form state after an edit.
    ///
    /// A mode different from `previous` snaps the percentage; otherwise the
    /// typed percentage is kept (falling back to the default if none).
    #[must_use]
    pub fn reconcile(previous: Option<TaxMode>, mode: TaxMode, typed: Option<Decimal>) -> Self {
        let mut settings = Self::for_mode(mode);
        if previous == Some(mode) {
            if let Some(percent) = typed {
                settings.set_percent(percent);
            }
        }
        settings
    }

    /// Tax and total for `subtotal`.
    #[must_use]
    pub fn apply(&self, subtotal: Decimal) -> TaxPreview {
        let tax = (subtotal * self.percent / Decimal::ONE_HUNDRED).round_dp(2);
        TaxPreview {
            subtotal,
            mode: self.mode,
            percent: self.percent,
            tax,
            total: subtotal - tax,
        }
    }
}

/// Computed tax breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxPreview {
    pub subtotal: Decimal,
    pub mode: TaxMode,
    pub percent: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Parse a percentage in `0..=100`.
///
/// # Errors
///
/// Returns [`LabConfigError::InvalidPercent`] otherwise.
pub fn parse_percent(raw: &str) -> Result<Decimal, LabConfigError> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    let invalid = || LabConfigError::InvalidPercent(raw.trim().to_owned());
    let percent = Decimal::from_str(trimmed).map_err(|_| invalid())?;
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(invalid());
    }
    Ok(percent.normalize())
}

/// A lab's stored configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabConfig {
    pub id: LabConfigId,
    pub owner: UserId,
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    /// Logo as a `data:` URL.
    pub logo: Option<String>,
    pub tax: TaxSettings,
}

/// Raw settings form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabConfigInput {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub tax_mode: String,
    pub tax_percent: String,
}

/// Validated settings, ready to save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabConfigFields {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub phone: String,
    pub email: Email,
    pub tax: TaxSettings,
}

impl LabConfigInput {
    /// Require every letterhead field and a well-formed email.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<LabConfigFields, LabConfigError> {
        fn required(value: &str, field: &'static str) -> Result<String, LabConfigError> {
            let value = value.trim();
            if value.is_empty() {
                Err(LabConfigError::MissingField(field))
            } else {
                Ok(value.to_owned())
            }
        }

        let name = required(&self.name, "lab name")?;
        let tax_id = required(&self.tax_id, "tax ID")?;
        let address = required(&self.address, "address")?;
        let phone = required(&self.phone, "phone")?;
        let email = Email::parse(&required(&self.email, "email")?)?;
        let mode = TaxMode::from_str(&self.tax_mode)?;
        let percent = if self.tax_percent.trim().is_empty() {
            mode.default_percent()
        } else {
            parse_percent(&self.tax_percent)?
        };

        Ok(LabConfigFields {
            name,
            tax_id,
            address,
            phone,
            email,
            tax: TaxSettings { mode, percent },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> LabConfigInput {
        LabConfigInput {
            name: "Dental Works".to_owned(),
            tax_id: "900123456-7".to_owned(),
            address: "Calle 1".to_owned(),
            phone: "555-0100".to_owned(),
            email: "lab@dentalworks.example".to_owned(),
            tax_mode: "vat".to_owned(),
            tax_percent: "19".to_owned(),
        }
    }

    #[test]
    fn test_mode_defaults() {
        assert_eq!(TaxMode::Vat.default_percent(), Decimal::new(19, 0));
        assert_eq!(TaxMode::Withholding.default_percent(), Decimal::new(145, 1));
    }

    #[test]
    fn test_select_mode_snaps_and_manual_edit_sticks() {
        let mut settings = TaxSettings::for_mode(TaxMode::Withholding);
        settings.select_mode(TaxMode::Vat);
        assert_eq!(settings.percent, Decimal::new(19, 0));

        settings.set_percent(Decimal::new(16, 0));
        assert_eq!(settings.percent, Decimal::new(16, 0));

        settings.select_mode(TaxMode::Withholding);
        assert_eq!(settings.percent, Decimal::new(145, 1));
    }

    #[test]
    fn test_reconcile() {
        let typed = Some(Decimal::new(16, 0));
        let kept = TaxSettings::reconcile(Some(TaxMode::Vat), TaxMode::Vat, typed);
        assert_eq!(kept.percent, Decimal::new(16, 0));

        let snapped = TaxSettings::reconcile(Some(TaxMode::Vat), TaxMode::Withholding, typed);
        assert_eq!(snapped.percent, Decimal::new(145, 1));

        let fresh = TaxSettings::reconcile(None, TaxMode::Vat, typed);
        assert_eq!(fresh.percent, Decimal::new(19, 0));
    }

    #[test]
    fn test_vat_preview_on_example_subtotal() {
        let preview = TaxSettings::for_mode(TaxMode::Vat).apply(PREVIEW_SUBTOTAL);
        assert_eq!(preview.subtotal, Decimal::new(100_000, 0));
        assert_eq!(preview.tax, Decimal::new(19_000, 0));
        assert_eq!(preview.total, Decimal::new(81_000, 0));
    }

    #[test]
    fn test_withholding_preview() {
        let preview = TaxSettings::for_mode(TaxMode::Withholding).apply(PREVIEW_SUBTOTAL);
        assert_eq!(preview.tax, Decimal::new(14_500, 0));
        assert_eq!(preview.total, Decimal::new(85_500, 0));
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("14.5").unwrap(), Decimal::new(145, 1));
        assert_eq!(parse_percent(" 19% ").unwrap(), Decimal::new(19, 0));
        assert!(parse_percent("101").is_err());
        assert!(parse_percent("-1").is_err());
        assert!(parse_percent("abc").is_err());
    }

    #[test]
    fn test_validate_requires_every_field() {
        let fields = input().validate().unwrap();
        assert_eq!(fields.tax.mode, TaxMode::Vat);
        assert_eq!(fields.email.as_str(), "lab@dentalworks.example");

        let missing_phone = LabConfigInput {
            phone: "  ".to_owned(),
            ..input()
        };
        assert_eq!(
            missing_phone.validate(),
            Err(LabConfigError::MissingField("phone"))
        );

        let bad_email = LabConfigInput {
            email: "lab.example".to_owned(),
            ..input()
        };
        assert!(matches!(
            bad_email.validate(),
            Err(LabConfigError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_validate_blank_percent_uses_mode_default() {
        let blank = LabConfigInput {
            tax_mode: "withholding".to_owned(),
            tax_percent: String::new(),
            ..input()
        };
        assert_eq!(blank.validate().unwrap().tax.percent, Decimal::new(145, 1));
    }
}
