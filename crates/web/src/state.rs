//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{AuthContext, AuthProvider};
use crate::config::AppConfig;
use crate::store::DataStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// remote collaborators and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn DataStore>,
    auth: AuthContext,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration
    /// * `store` - Remote data store
    /// * `provider` - Remote auth service
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn DataStore>, provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                auth: AuthContext::new(provider),
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the remote data store.
    #[must_use]
    pub fn store(&self) -> &dyn DataStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the authentication context.
    #[must_use]
    pub fn auth(&self) -> &AuthContext {
        &self.inner.auth
    }
}
