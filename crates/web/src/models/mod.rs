//! Session-held models.

pub mod session;

pub use session::{CurrentUser, PendingCapture};
