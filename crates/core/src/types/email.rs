//! Contact email addresses for clinics and lab letterheads.

use core::fmt;

use serde::Serialize;

/// Why a contact email was refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailError {
    #[error("address is blank")]
    Empty,
    #[error("address is longer than {} characters", Email::MAX_LENGTH)]
    TooLong,
    #[error("expected something like name@example.com")]
    Malformed,
}

/// A contact email, shaped `local@domain.tld` with no whitespace.
///
/// Only the shape is checked; nothing here knows whether the mailbox exists.
///
/// ```
/// use dentalab_core::Email;
///
/// assert_eq!(Email::parse(" front-desk@smile.example ").unwrap().as_str(), "front-desk@smile.example");
/// assert!(Email::parse("reception@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub const MAX_LENGTH: usize = 254;

    /// Parse a trimmed address.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` for blank, overlong or malformed input.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let address = raw.trim();
        if address.is_empty() {
            return Err(EmailError::Empty);
        }
        if address.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }

        let well_formed = !address.chars().any(char::is_whitespace)
            && address.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain
                        .rsplit_once('.')
                        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
            });
        if !well_formed {
            return Err(EmailError::Malformed);
        }

        Ok(Self(address.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinic_addresses_accepted() {
        for address in [
            "reception@smile.example",
            "dr.x+orders@clinic.example.co",
            "a@b.c",
        ] {
            assert!(Email::parse(address).is_ok(), "{address}");
        }
    }

    #[test]
    fn test_blank_and_overlong() {
        assert_eq!(Email::parse("  \t"), Err(EmailError::Empty));
        let long = format!("{}@lab.example", "x".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_malformed_shapes() {
        for address in [
            "front-desk",
            "a@b@lab.example",
            "@lab.example",
            "lab@",
            "lab@localhost",
            "lab@.example",
            "lab@example.",
            "front desk@lab.example",
        ] {
            assert_eq!(Email::parse(address), Err(EmailError::Malformed), "{address}");
        }
    }
}
