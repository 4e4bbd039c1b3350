//! Administrative back-office screen.
//!
//! Users, memberships, payments and the global work-order count are loaded
//! together; a failed slice leaves the rest of the screen usable.

use dentalab_core::{
    BackofficeStats, LocalList, Membership, Payment, UserId, UserProfile,
};

use super::{Notices, loaded};
use crate::db::{
    MembershipRepository, PaymentRepository, RepositoryError, UserRepository, WorkOrderRepository,
};
use crate::models::CurrentUser;
use crate::store::DataStore;

/// Everything the admin pages show.
#[derive(Debug, Clone)]
pub struct BackofficeScreen {
    pub users: LocalList<UserProfile>,
    pub memberships: Vec<Membership>,
    pub payments: Vec<Payment>,
    pub open_work_orders: usize,
}

impl BackofficeScreen {
    /// Load every back-office slice concurrently.
    pub async fn load(store: &dyn DataStore, admin: &CurrentUser, notices: &mut Notices) -> Self {
        let users = UserRepository::new(store, &admin.token);
        let memberships = MembershipRepository::new(store, &admin.token);
        let payments = PaymentRepository::new(store, &admin.token);
        let orders = WorkOrderRepository::new(store, &admin.token, admin.id());

        let (user_rows, membership_rows, payment_rows, order_rows) = tokio::join!(
            users.list_all(),
            memberships.list_all(),
            payments.list_all(),
            orders.list_all(),
        );

        let open_work_orders = loaded("Work orders", order_rows, notices)
            .iter()
            .filter(|o| o.status.is_open())
            .count();

        Self {
            users: LocalList::new(loaded("Users", user_rows, notices)),
            memberships: loaded("Memberships", membership_rows, notices),
            payments: loaded("Payments", payment_rows, notices),
            open_work_orders,
        }
    }

    #[must_use]
    pub fn stats(&self) -> BackofficeStats {
        BackofficeStats::compute(
            self.users.items(),
            &self.memberships,
            &self.payments,
            self.open_work_orders,
        )
    }

    /// Email of a membership's owner, when the owner is loaded.
    #[must_use]
    pub fn owner_email(&self, user_id: UserId) -> Option<&str> {
        self.users.get(user_id).map(|u| u.email.as_str())
    }

    /// Flip an account between active and inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user is not on screen or the
    /// store no longer has it.
    pub async fn toggle_user(
        &mut self,
        store: &dyn DataStore,
        admin: &CurrentUser,
        id: UserId,
    ) -> Result<UserProfile, RepositoryError> {
        let active = self.users.get(id).ok_or(RepositoryError::NotFound)?.active;
        let repo = UserRepository::new(store, &admin.token);
        let updated = repo.set_active(id, !active).await?;
        self.users.replace(updated.clone());
        tracing::info!(user_id = %id, active = updated.active, "User activation changed");
        Ok(updated)
    }

    /// Delete a user profile. Memberships, payments and lab data stay.
    ///
    /// # Errors
    ///
    /// Returns the store error; local state is unchanged then.
    pub async fn delete_user(
        &mut self,
        store: &dyn DataStore,
        admin: &CurrentUser,
        id: UserId,
    ) -> Result<UserProfile, RepositoryError> {
        let repo = UserRepository::new(store, &admin.token);
        let deleted = repo.delete(id).await?;
        self.users.remove(id);
        tracing::info!(user_id = %id, "User deleted");
        Ok(deleted)
    }
}
