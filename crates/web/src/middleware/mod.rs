//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, in-memory store)

pub mod auth;
pub mod session;

pub use auth::{
    GuestOnly, HOME_PATH, OptionalAuth, RequireAdmin, RequireAuth, clear_current_user,
    set_current_user,
};
pub use session::create_session_layer;
