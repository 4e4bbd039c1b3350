//! Web application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DENTALAB_BASE_URL` - Public URL of the application
//! - `DATASTORE_URL` - Base URL of the hosted backend (data + auth)
//! - `DATASTORE_ANON_KEY` - Public API key of the hosted backend
//!
//! ## Optional
//! - `DENTALAB_HOST` - Bind address (default: 127.0.0.1)
//! - `DENTALAB_PORT` - Listen port (default: 3000)
//! - `PAYMENT_CLIENT_ID` - Payment widget client ID (hides the buttons when unset)
//! - `PAYMENT_CURRENCY` - Currency for plan payments (default: USD)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//! - `DENTALAB_LOG_JSON` - Emit JSON logs when set

use std::net::{IpAddr, SocketAddr};

use dentalab_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Hosted backend configuration
    pub datastore: DataStoreConfig,
    /// Payment widget configuration
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

/// Hosted backend (data store + auth) configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct DataStoreConfig {
    /// Base URL, e.g. `https://abc.backend.example`
    pub url: Url,
    /// Public API key sent as `apikey`
    pub anon_key: SecretString,
}

impl std::fmt::Debug for DataStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStoreConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment widget configuration.
#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    /// Public client ID for the widget script; `None` hides the buttons
    pub client_id: Option<String>,
    /// Currency plans are charged in
    pub currency: CurrencyCode,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("DENTALAB_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DENTALAB_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("DENTALAB_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("DENTALAB_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("DENTALAB_BASE_URL")?;
        parse_url("DENTALAB_BASE_URL", &base_url)?;

        let datastore = DataStoreConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let log_json = get_optional_env("DENTALAB_LOG_JSON").is_some_and(|v| is_truthy(&v));

        Ok(Self {
            host,
            port,
            base_url,
            datastore,
            payment,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_json,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl DataStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("DATASTORE_URL")?;
        let url = parse_url("DATASTORE_URL", &raw_url)?;
        let anon_key = get_required_env("DATASTORE_ANON_KEY")?;
        reject_placeholder(&anon_key, "DATASTORE_ANON_KEY")?;

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("PAYMENT_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_string(), e))?;
        Ok(Self {
            client_id: get_optional_env("PAYMENT_CLIENT_ID").filter(|id| !id.trim().is_empty()),
            currency,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Reject values that are obviously unfilled template placeholders.
fn reject_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    if lower.trim().is_empty() {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "is empty".to_string(),
        ));
    }
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            datastore: DataStoreConfig {
                url: Url::parse("https://abc.backend.test").unwrap(),
                anon_key: SecretString::from("eyJhbGciOiJIUzI1NiJ9.c2VjcmV0LWtleQ"),
            },
            payment: PaymentConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            log_json: false,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_is_secure() {
        let mut config = config();
        assert!(!config.is_secure());
        config.base_url = "https://lab.dentalab.test".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_datastore_config_debug_redacts_key() {
        let debug_output = format!("{:?}", config().datastore);

        assert!(debug_output.contains("abc.backend.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("c2VjcmV0LWtleQ"));
    }

    #[test]
    fn test_reject_placeholder() {
        let err = reject_placeholder("your-anon-key", "DATASTORE_ANON_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(reject_placeholder("   ", "DATASTORE_ANON_KEY").is_err());
        assert!(reject_placeholder("eyJhbGciOiJIUzI1NiJ9.abc", "DATASTORE_ANON_KEY").is_ok());
    }

    #[test]
    fn test_parse_url_requires_http() {
        assert!(parse_url("DATASTORE_URL", "https://abc.backend.test").is_ok());
        assert!(parse_url("DATASTORE_URL", "ftp://abc.backend.test").is_err());
        assert!(parse_url("DATASTORE_URL", "not a url").is_err());
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" TRUE "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
