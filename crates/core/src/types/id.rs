//! Newtype IDs for type-safe entity references.
//!
//! Every record in the hosted data store is keyed by a UUID. Use the
//! `define_id!` macro to create wrappers that prevent accidentally mixing
//! IDs from different entity types (a `ClinicId` is never a `DentistId`).

use std::str::FromStr;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`uuid::Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `generate()`, `as_uuid()`
/// - `Display` and `FromStr` (hyphenated form)
///
/// # Example
///
/// ```rust
/// # use dentalab_core::define_id;
/// define_id!(InvoiceId);
/// define_id!(PatientId);
///
/// let invoice = InvoiceId::generate();
/// let parsed: InvoiceId = invoice.to_string().parse().unwrap();
/// assert_eq!(invoice, parsed);
///
/// // These are different types, so this won't compile:
/// // let _: PatientId = invoice;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ClinicId);
define_id!(DentistId);
define_id!(ServiceId);
define_id!(TechnicianId);
define_id!(WorkOrderId);
define_id!(MembershipId);
define_id!(PaymentId);
define_id!(LabConfigId);

/// Parse an optional ID from a form value, treating blank input as `None`.
///
/// HTML `<select>` elements submit an empty string for the placeholder
/// option, so `""` is not an error here.
///
/// # Errors
///
/// Returns the UUID parse error for non-blank input that is not a UUID.
pub fn parse_optional_id<T>(raw: Option<&str>) -> Result<Option<T>, T::Err>
where
    T: FromStr,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = ClinicId::generate();
        let parsed: ClinicId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id = DentistId::generate();
        let parsed: DentistId = format!("  {id} ").parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = uuid::Uuid::new_v4();
        let id = WorkOrderId::new(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn test_parse_optional_id() {
        assert_eq!(parse_optional_id::<TechnicianId>(None).unwrap(), None);
        assert_eq!(parse_optional_id::<TechnicianId>(Some("")).unwrap(), None);
        assert_eq!(parse_optional_id::<TechnicianId>(Some("  ")).unwrap(), None);
        assert!(parse_optional_id::<TechnicianId>(Some("not-a-uuid")).is_err());

        let id = TechnicianId::generate();
        let s = id.to_string();
        assert_eq!(
            parse_optional_id::<TechnicianId>(Some(s.as_str())).unwrap(),
            Some(id)
        );
    }
}
