//! Reference-data registries: clinics, dentists, services and technicians.
//!
//! Each registry has a domain record, an input type carrying raw form values,
//! and a `validate` step that trims and checks required fields before any
//! remote call is made.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::local::{LocalList, Record};
use crate::types::{
    ClinicId, DentistId, Email, EmailError, ServiceCategory, ServiceId, TechnicianId, UserId,
};

/// Validation failures for registry input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A required text field was empty after trimming.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// An optional email field was filled in but is not an email.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A price could not be parsed.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// A price was below zero.
    #[error("price cannot be negative")]
    NegativePrice,

    /// The category is not part of the fixed catalogue.
    #[error("unknown service category: {0}")]
    UnknownCategory(String),
}

fn required(value: &str, field: &'static str) -> Result<String, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RegistryError::MissingField(field))
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Parse a non-negative money amount typed into a form.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidPrice`] for non-numeric input and
/// [`RegistryError::NegativePrice`] for amounts below zero.
pub fn parse_price(raw: &str) -> Result<Decimal, RegistryError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() {
        return Err(RegistryError::MissingField("price"));
    }
    let price = Decimal::from_str(&cleaned)
        .map_err(|_| RegistryError::InvalidPrice(raw.trim().to_owned()))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(RegistryError::NegativePrice);
    }
    Ok(price)
}

// =============================================================================
// Clinics
// =============================================================================

/// A client clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ClinicId,
    pub owner: UserId,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

impl Record for Clinic {
    type Id = ClinicId;

    fn id(&self) -> ClinicId {
        self.id
    }
}

/// Clinic form values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClinicInput {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl ClinicInput {
    /// Trim every field and check the name and (optional) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or a non-blank email is invalid.
    pub fn validate(self) -> Result<Self, RegistryError> {
        let email = self.email.trim();
        let email = if email.is_empty() {
            String::new()
        } else {
            Email::parse(email)?.into_inner()
        };
        Ok(Self {
            name: required(&self.name, "clinic name")?,
            address: self.address.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            email,
        })
    }
}

// =============================================================================
// Dentists
// =============================================================================

/// A dentist working at exactly one clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dentist {
    pub id: DentistId,
    pub owner: UserId,
    pub clinic_id: ClinicId,
    pub name: String,
    pub specialty: String,
}

impl Record for Dentist {
    type Id = DentistId;

    fn id(&self) -> DentistId {
        self.id
    }
}

/// Dentist form values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DentistInput {
    pub name: String,
    pub specialty: String,
    pub clinic_id: Option<ClinicId>,
}

/// Validated dentist fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DentistFields {
    pub name: String,
    pub specialty: String,
    pub clinic_id: ClinicId,
}

impl DentistInput {
    /// Trim fields and require a name and a clinic.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or no clinic is selected.
    pub fn validate(self) -> Result<DentistFields, RegistryError> {
        Ok(DentistFields {
            name: required(&self.name, "dentist name")?,
            specialty: self.specialty.trim().to_owned(),
            clinic_id: self.clinic_id.ok_or(RegistryError::MissingField("clinic"))?,
        })
    }
}

// =============================================================================
// Services
// =============================================================================

/// A billable lab service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub owner: UserId,
    pub name: String,
    pub base_price: Decimal,
    pub category: ServiceCategory,
    pub active: bool,
}

impl Record for Service {
    type Id = ServiceId;

    fn id(&self) -> ServiceId {
        self.id
    }
}

/// Service form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInput {
    pub name: String,
    pub base_price: String,
    pub category: String,
    pub active: bool,
}

/// Validated service fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFields {
    pub name: String,
    pub base_price: Decimal,
    pub category: ServiceCategory,
    pub active: bool,
}

impl ServiceInput {
    /// Trim and parse the service fields.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank name, a bad price or an unknown category.
    pub fn validate(self) -> Result<ServiceFields, RegistryError> {
        let category = ServiceCategory::from_str(&self.category)
            .map_err(|e| RegistryError::UnknownCategory(e.value))?;
        Ok(ServiceFields {
            name: required(&self.name, "service name")?,
            base_price: parse_price(&self.base_price)?,
            category,
            active: self.active,
        })
    }
}

/// Services grouped by category in catalogue order, for the price list.
#[must_use]
pub fn price_list(services: &[Service]) -> Vec<(ServiceCategory, Vec<&Service>)> {
    ServiceCategory::ALL
        .iter()
        .filter_map(|category| {
            let mut entries: Vec<&Service> = services
                .iter()
                .filter(|s| s.category == *category)
                .collect();
            if entries.is_empty() {
                return None;
            }
            entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            Some((*category, entries))
        })
        .collect()
}

// =============================================================================
// Technicians
// =============================================================================

/// A lab technician who can be assigned to work orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub owner: UserId,
    pub name: String,
    pub specialty: String,
    pub active: bool,
}

impl Record for Technician {
    type Id = TechnicianId;

    fn id(&self) -> TechnicianId {
        self.id
    }
}

/// Technician form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TechnicianInput {
    pub name: String,
    pub specialty: String,
    pub active: bool,
}

impl TechnicianInput {
    /// Trim fields and require a name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank.
    pub fn validate(self) -> Result<Self, RegistryError> {
        Ok(Self {
            name: required(&self.name, "technician name")?,
            specialty: self.specialty.trim().to_owned(),
            active: self.active,
        })
    }
}

// =============================================================================
// Clinic directory
// =============================================================================

/// Local mirror of a user's clinics and their dentists.
#[derive(Debug, Clone, Default)]
pub struct ClinicDirectory {
    pub clinics: LocalList<Clinic>,
    pub dentists: LocalList<Dentist>,
}

impl ClinicDirectory {
    /// Build a directory from loaded slices.
    #[must_use]
    pub const fn new(clinics: Vec<Clinic>, dentists: Vec<Dentist>) -> Self {
        Self {
            clinics: LocalList::new(clinics),
            dentists: LocalList::new(dentists),
        }
    }

    /// Dentists belonging to `clinic`.
    pub fn dentists_of(&self, clinic: ClinicId) -> impl Iterator<Item = &Dentist> {
        self.dentists.iter().filter(move |d| d.clinic_id == clinic)
    }

    /// Name of a clinic, if loaded.
    #[must_use]
    pub fn clinic_name(&self, clinic: ClinicId) -> Option<&str> {
        self.clinics.get(clinic).map(|c| c.name.as_str())
    }

    /// Name of a dentist, if loaded.
    #[must_use]
    pub fn dentist_name(&self, dentist: DentistId) -> Option<&str> {
        self.dentists.get(dentist).map(|d| d.name.as_str())
    }

    /// Whether `dentist` is loaded and works at `clinic`.
    #[must_use]
    pub fn dentist_works_at(&self, dentist: DentistId, clinic: ClinicId) -> bool {
        self.dentists
            .get(dentist)
            .is_some_and(|d| d.clinic_id == clinic)
    }

    /// Drop a clinic and every dentist attached to it.
    ///
    /// Dependents are removed whether or not their remote deletion
    /// succeeded; the clinic is gone either way.
    pub fn remove_clinic(&mut self, clinic: ClinicId) -> Vec<Dentist> {
        self.clinics.remove(clinic);
        self.dentists.remove_where(|d| d.clinic_id == clinic)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn clinic(owner: UserId, name: &str) -> Clinic {
        Clinic {
            id: ClinicId::generate(),
            owner,
            name: name.to_owned(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
        }
    }

    fn dentist(owner: UserId, clinic_id: ClinicId, name: &str) -> Dentist {
        Dentist {
            id: DentistId::generate(),
            owner,
            clinic_id,
            name: name.to_owned(),
            specialty: String::new(),
        }
    }

    #[test]
    fn test_clinic_input_trims_and_requires_name() {
        let input = ClinicInput {
            name: "  Smile Clinic ".to_owned(),
            address: " 5th Ave ".to_owned(),
            phone: String::new(),
            email: " front@smile.example ".to_owned(),
        };
        let valid = input.validate().unwrap();
        assert_eq!(valid.name, "Smile Clinic");
        assert_eq!(valid.address, "5th Ave");
        assert_eq!(valid.email, "front@smile.example");

        let blank = ClinicInput {
            name: "   ".to_owned(),
            ..ClinicInput::default()
        };
        assert_eq!(
            blank.validate(),
            Err(RegistryError::MissingField("clinic name"))
        );
    }

    #[test]
    fn test_clinic_input_rejects_bad_optional_email() {
        let input = ClinicInput {
            name: "Smile".to_owned(),
            email: "front-desk".to_owned(),
            ..ClinicInput::default()
        };
        assert!(matches!(
            input.validate(),
            Err(RegistryError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_dentist_input_requires_clinic() {
        let input = DentistInput {
            name: "Dr. X".to_owned(),
            specialty: "Orthodontics".to_owned(),
            clinic_id: None,
        };
        assert_eq!(input.validate(), Err(RegistryError::MissingField("clinic")));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("100").unwrap(), Decimal::new(100, 0));
        assert_eq!(parse_price(" 1,250.50 ").unwrap(), Decimal::new(125_050, 2));
        assert_eq!(parse_price("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_price("-1"), Err(RegistryError::NegativePrice));
        assert!(matches!(parse_price("abc"), Err(RegistryError::InvalidPrice(_))));
        assert_eq!(parse_price(""), Err(RegistryError::MissingField("price")));
    }

    #[test]
    fn test_service_input_validates_category() {
        let input = ServiceInput {
            name: "Zirconia crown".to_owned(),
            base_price: "100".to_owned(),
            category: "fixed_prosthesis".to_owned(),
            active: true,
        };
        let fields = input.validate().unwrap();
        assert_eq!(fields.category, ServiceCategory::FixedProsthesis);
        assert_eq!(fields.base_price, Decimal::new(100, 0));

        let bad = ServiceInput {
            name: "Crown".to_owned(),
            base_price: "100".to_owned(),
            category: "crowns".to_owned(),
            active: true,
        };
        assert_eq!(
            bad.validate(),
            Err(RegistryError::UnknownCategory("crowns".to_owned()))
        );
    }

    #[test]
    fn test_remove_clinic_cascades_to_local_dentists() {
        let owner = UserId::generate();
        let smile = clinic(owner, "Smile Clinic");
        let other = clinic(owner, "Other");
        let mut directory = ClinicDirectory::new(
            vec![smile.clone(), other.clone()],
            vec![
                dentist(owner, smile.id, "Dr. X"),
                dentist(owner, other.id, "Dr. Y"),
                dentist(owner, smile.id, "Dr. Z"),
            ],
        );

        let removed = directory.remove_clinic(smile.id);

        assert_eq!(removed.len(), 2);
        assert!(directory.clinics.get(smile.id).is_none());
        assert_eq!(directory.dentists.len(), 1);
        assert!(directory.dentists.iter().all(|d| d.clinic_id != smile.id));
        assert_eq!(directory.dentists_of(other.id).count(), 1);
    }

    #[test]
    fn test_price_list_groups_in_catalogue_order() {
        let owner = UserId::generate();
        let service = |name: &str, category| Service {
            id: ServiceId::generate(),
            owner,
            name: name.to_owned(),
            base_price: Decimal::ONE,
            category,
            active: true,
        };
        let services = vec![
            service("Retainer", ServiceCategory::Orthodontics),
            service("crown", ServiceCategory::FixedProsthesis),
            service("Bridge", ServiceCategory::FixedProsthesis),
        ];

        let groups = price_list(&services);

        assert_eq!(groups.len(), 2);
        let (first_category, first_entries) = &groups[0];
        assert_eq!(*first_category, ServiceCategory::FixedProsthesis);
        assert_eq!(first_entries[0].name, "Bridge");
        assert_eq!(groups[1].0, ServiceCategory::Orthodontics);
    }
}
