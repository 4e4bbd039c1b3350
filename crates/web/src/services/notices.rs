//! User-facing notification channel.
//!
//! Handlers collect [`Notice`]s while they work and hand them to the page
//! they render. When a handler redirects instead, the notices travel in the
//! session as flash messages and the next page drains them.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session::keys;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// CSS modifier used by the notice partial.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Info => "notice--info",
            Self::Success => "notice--success",
            Self::Warning => "notice--warning",
            Self::Error => "notice--error",
        }
    }

    /// ARIA role: errors interrupt, everything else is polite.
    #[must_use]
    pub const fn role(&self) -> &'static str {
        match self {
            Self::Error => "alert",
            _ => "status",
        }
    }
}

/// One message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// Notices gathered during one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notices(Vec<Notice>);

impl Notices {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.0.push(Notice {
            severity,
            message: message.into(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Append another batch, keeping order.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any notice is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|n| n.severity == Severity::Error)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notice> {
        self.0.iter()
    }

    /// Take the flash notices left by the previous request.
    ///
    /// Session failures are logged and yield no notices.
    pub async fn take_flash(session: &Session) -> Self {
        match session.remove::<Self>(keys::FLASH).await {
            Ok(flash) => flash.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read flash notices");
                Self::new()
            }
        }
    }

    /// Store these notices for the next request, appended to any already
    /// waiting.
    pub async fn flash(self, session: &Session) {
        if self.is_empty() {
            return;
        }
        let mut pending = Self::take_flash(session).await;
        pending.extend(self);
        if let Err(e) = session.insert(keys::FLASH, &pending).await {
            tracing::warn!(error = %e, "Failed to store flash notices");
        }
    }
}

impl<'a> IntoIterator for &'a Notices {
    type Item = &'a Notice;
    type IntoIter = std::slice::Iter<'a, Notice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut notices = Notices::new();
        notices.warning("Clinics could not be loaded.");
        notices.success("Saved.");

        let severities: Vec<Severity> = notices.iter().map(|n| n.severity).collect();
        assert_eq!(severities, vec![Severity::Warning, Severity::Success]);
        assert!(!notices.has_errors());

        notices.error("Failed.");
        assert!(notices.has_errors());
    }

    #[test]
    fn test_serializes_as_list() {
        let mut notices = Notices::new();
        notices.info("Nothing to finalize.");
        let json = serde_json::to_value(&notices).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!([{ "severity": "info", "message": "Nothing to finalize." }])
        );
    }
}
