//! Screen-level services.
//!
//! A screen loads its slices of remote data concurrently, keeps them as
//! local lists, and patches those lists with the authoritative record each
//! mutation returns. Route handlers stay thin: parse the form, call a
//! service, render.

pub mod backoffice;
pub mod notices;
pub mod registry;
pub mod work_orders;

use crate::db::RepositoryError;

pub use backoffice::BackofficeScreen;
pub use notices::{Notice, Notices, Severity};
pub use registry::ClinicDirectoryScreen;
pub use work_orders::{BoardError, WorkOrderBoard};

/// Unwrap one loaded slice.
///
/// A failed slice is logged, reported as a warning notice and left empty so
/// the rest of the screen still renders.
pub fn loaded<T>(what: &str, result: Result<Vec<T>, RepositoryError>, notices: &mut Notices) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, slice = what, "Failed to load slice");
            notices.warning(format!("{what} could not be loaded: {}", e.user_message()));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_failed_slice_is_empty_with_warning() {
        let mut notices = Notices::new();
        let items: Vec<u8> = loaded(
            "Clinics",
            Err(RepositoryError::Store(StoreError::Parse("bad".to_string()))),
            &mut notices,
        );
        assert!(items.is_empty());
        let first = notices.iter().next().map(|n| n.severity);
        assert_eq!(first, Some(Severity::Warning));
    }

    #[test]
    fn test_loaded_slice_passes_through() {
        let mut notices = Notices::new();
        let items = loaded("Clinics", Ok(vec![1, 2]), &mut notices);
        assert_eq!(items, vec![1, 2]);
        assert!(notices.is_empty());
    }
}
