//! Session-held cart of the order being composed.
//!
//! Nothing here calls the data store except to look up the service being
//! added; the cart only reaches the store when the order is saved. Cart
//! buttons submit the whole compose form, so every action also stores the
//! draft header typed so far.

use axum::{
    Form,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{OrderError, ServiceId};

use super::{BoardQuery, DraftForm, filter_query, load_cart, save_cart, save_draft};
use crate::db::ServiceRepository;
use crate::middleware::RequireAuth;
use crate::services::Notices;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddLineForm {
    #[serde(flatten)]
    pub draft: DraftForm,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub tooth: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveLineForm {
    #[serde(flatten)]
    pub draft: DraftForm,
    #[serde(default)]
    pub index: String,
}

/// Parse a quantity field; anything but a positive whole number is rejected.
fn parse_quantity(raw: &str) -> Result<u32, OrderError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|q| *q >= 1)
        .ok_or(OrderError::InvalidQuantity)
}

async fn back_to_board(
    session: &Session,
    notices: Notices,
    query: &BoardQuery,
    draft: &DraftForm,
) -> Redirect {
    save_draft(session, draft).await;
    notices.flash(session).await;
    Redirect::to(&format!("/work-orders{}", filter_query(&query.filter())))
}

/// Add a line to the cart.
#[instrument(skip(state, session, user, query, form), fields(user_id = %user.id()))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
    Form(form): Form<AddLineForm>,
) -> Redirect {
    let mut notices = Notices::new();

    let Ok(service_id) = form.service_id.trim().parse::<ServiceId>() else {
        notices.error("Select a service to add.");
        return back_to_board(&session, notices, &query, &form.draft).await;
    };
    let quantity = match parse_quantity(&form.quantity) {
        Ok(quantity) => quantity,
        Err(e) => {
            notices.error(e.to_string());
            return back_to_board(&session, notices, &query, &form.draft).await;
        }
    };

    let repo = ServiceRepository::new(state.store(), &user.token, user.id());
    let service = match repo.list().await {
        Ok(services) => services.into_iter().find(|s| s.id == service_id),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load services for cart");
            notices.error(e.user_message());
            return back_to_board(&session, notices, &query, &form.draft).await;
        }
    };
    let Some(service) = service else {
        notices.error("That service no longer exists.");
        return back_to_board(&session, notices, &query, &form.draft).await;
    };

    let mut cart = load_cart(&session).await;
    let tooth = Some(form.tooth.as_str()).filter(|t| !t.trim().is_empty());
    match cart.add(&service, quantity, tooth) {
        Ok(()) => match save_cart(&session, &cart).await {
            Ok(()) => notices.success(format!("Added {quantity} × {}.", service.name)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to save cart");
                notices.error("The cart could not be saved. Try again.");
            }
        },
        Err(e) => notices.error(e.to_string()),
    }

    back_to_board(&session, notices, &query, &form.draft).await
}

/// Remove one line from the cart.
#[instrument(skip(session, user, query, form), fields(user_id = %user.id()))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    session: Session,
    Query(query): Query<BoardQuery>,
    Form(form): Form<RemoveLineForm>,
) -> Redirect {
    let mut notices = Notices::new();
    let mut cart = load_cart(&session).await;

    match form.index.trim().parse().ok().and_then(|i| cart.remove(i)) {
        Some(line) => {
            if let Err(e) = save_cart(&session, &cart).await {
                tracing::error!(error = %e, "Failed to save cart");
                notices.error("The cart could not be saved. Try again.");
            } else {
                notices.info(format!("Removed {} from the cart.", line.service_name));
            }
        }
        None => notices.warning("That cart line no longer exists."),
    }

    back_to_board(&session, notices, &query, &form.draft).await
}

/// Empty the cart.
#[instrument(skip(session, user, query, draft), fields(user_id = %user.id()))]
pub async fn clear(
    RequireAuth(user): RequireAuth,
    session: Session,
    Query(query): Query<BoardQuery>,
    Form(draft): Form<DraftForm>,
) -> Redirect {
    let mut notices = Notices::new();
    let mut cart = load_cart(&session).await;
    cart.clear();

    if let Err(e) = save_cart(&session, &cart).await {
        tracing::error!(error = %e, "Failed to save cart");
        notices.error("The cart could not be saved. Try again.");
    } else {
        notices.info("Cart cleared.");
    }

    back_to_board(&session, notices, &query, &draft).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn form<T: serde::de::DeserializeOwned>(body: &'static str) -> T {
        use axum::extract::FromRequest;

        let request = axum::http::Request::post("/work-orders/cart/add")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(body))
            .unwrap();
        let Form(parsed) = Form::<T>::from_request(request, &()).await.unwrap();
        parsed
    }

    #[tokio::test]
    async fn test_cart_forms_carry_the_draft_header() {
        let add: AddLineForm = form(
            "patient=Jane+Doe&clinic_id=c1&notes=Shade+A2&service_id=s1&quantity=2&tooth=11",
        )
        .await;
        assert_eq!(add.draft.patient, "Jane Doe");
        assert_eq!(add.draft.clinic_id, "c1");
        assert_eq!(add.draft.notes, "Shade A2");
        assert_eq!(add.quantity, "2");

        let remove: RemoveLineForm = form("index=1&patient=Jane").await;
        assert_eq!(remove.index, "1");
        assert_eq!(remove.draft.patient, "Jane");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 2 "), Ok(2));
        assert_eq!(parse_quantity("0"), Err(OrderError::InvalidQuantity));
        assert_eq!(parse_quantity("-1"), Err(OrderError::InvalidQuantity));
        assert_eq!(parse_quantity("two"), Err(OrderError::InvalidQuantity));
    }
}
