//! Account administration: search, activation and deletion.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{TextFilter, UserId, UserProfile};

use super::SearchQuery;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::routes::{ConfirmTemplate, Layout, flash_redirect};
use crate::services::{BackofficeScreen, Notices};
use crate::state::AppState;

/// One account in the user table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub lab_name: String,
    pub role: &'static str,
    pub active: bool,
    pub registered_on: String,
    /// The signed-in administrator's own row has no actions.
    pub is_self: bool,
}

impl UserRow {
    fn new(profile: &UserProfile, admin: UserId) -> Self {
        Self {
            id: profile.id,
            name: profile.display_name().to_string(),
            email: profile.email.clone(),
            lab_name: profile.lab_name.clone(),
            role: profile.role.label(),
            active: profile.active,
            registered_on: profile
                .registered_at
                .map(|t| t.date_naive().to_string())
                .unwrap_or_default(),
            is_self: profile.id == admin,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub layout: Layout,
    pub users: Vec<UserRow>,
    pub query: String,
    /// The search as a query string, for action targets.
    pub search: String,
    pub total: usize,
}

/// The user list, keeping the admin's search.
fn users_path(query: &SearchQuery) -> String {
    let q = query.q.trim();
    if q.is_empty() {
        return "/admin/users".to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", q)
        .finish();
    format!("/admin/users?{encoded}")
}

fn search_suffix(query: &SearchQuery) -> String {
    users_path(query)
        .strip_prefix("/admin/users")
        .unwrap_or_default()
        .to_string()
}

fn render(
    admin: &CurrentUser,
    screen: &BackofficeScreen,
    notices: Notices,
    query: &SearchQuery,
) -> UsersTemplate {
    let filter: TextFilter = query.filter();
    UsersTemplate {
        layout: Layout::new("Users", "admin", Some(admin), notices),
        users: screen
            .users
            .iter()
            .filter(|u| filter.matches_user(u))
            .map(|u| UserRow::new(u, admin.id()))
            .collect(),
        query: filter.as_str().to_string(),
        search: search_suffix(query),
        total: screen.users.len(),
    }
}

/// List accounts, optionally filtered by name, email or lab.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn index(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> UsersTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let screen = BackofficeScreen::load(state.store(), &user, &mut notices).await;
    render(&user, &screen, notices, &query)
}

/// Activate or deactivate an account.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn toggle(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let mut notices = Notices::new();

    if id == user.id() {
        notices.error("You cannot deactivate your own account.");
        return flash_redirect(&session, notices, &users_path(&query)).await;
    }

    let mut loading = Notices::new();
    let mut screen = BackofficeScreen::load(state.store(), &user, &mut loading).await;
    match screen.toggle_user(state.store(), &user, id).await {
        Ok(profile) if profile.active => {
            notices.success(format!("{} is active again.", profile.display_name()));
        }
        Ok(profile) => notices.success(format!("{} was deactivated.", profile.display_name())),
        Err(e) => {
            tracing::warn!(error = %e, target_user = %id, "Failed to toggle user");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, &users_path(&query)).await
}

/// Ask before deleting an account.
#[instrument(skip(state, user, query), fields(user_id = %user.id()))]
pub async fn confirm_delete(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Query(query): Query<SearchQuery>,
) -> Result<ConfirmTemplate> {
    let mut notices = Notices::new();
    let screen = BackofficeScreen::load(state.store(), &user, &mut notices).await;
    let profile = screen
        .users
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

    Ok(ConfirmTemplate {
        layout: Layout::new("Delete user", "admin", Some(&user), notices),
        heading: "Delete user".to_string(),
        message: format!(
            "Delete the account of {} ({})? Their lab records are kept.",
            profile.display_name(),
            profile.email
        ),
        action: format!("/admin/users/{id}/delete{}", search_suffix(&query)),
        button: "Delete".to_string(),
        cancel: users_path(&query),
    })
}

/// Delete an account's profile.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id()))]
pub async fn delete(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let mut notices = Notices::new();

    if id == user.id() {
        notices.error("You cannot delete your own account.");
        return flash_redirect(&session, notices, &users_path(&query)).await;
    }

    let mut loading = Notices::new();
    let mut screen = BackofficeScreen::load(state.store(), &user, &mut loading).await;
    match screen.delete_user(state.store(), &user, id).await {
        Ok(profile) => notices.success(format!("{} was deleted.", profile.display_name())),
        Err(e) => {
            tracing::warn!(error = %e, target_user = %id, "Failed to delete user");
            notices.error(e.user_message());
        }
    }

    flash_redirect(&session, notices, &users_path(&query)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_path_keeps_the_search() {
        let blank = SearchQuery { q: "  ".to_string() };
        assert_eq!(users_path(&blank), "/admin/users");
        assert_eq!(search_suffix(&blank), "");

        let search = SearchQuery {
            q: "Dental Works".to_string(),
        };
        assert_eq!(users_path(&search), "/admin/users?q=Dental+Works");
        assert_eq!(search_suffix(&search), "?q=Dental+Works");
    }
}
