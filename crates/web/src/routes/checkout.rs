//! Payment widget callbacks.
//!
//! The widget creates and captures the payment order itself. On approval its
//! success callback posts the capture details here; the capture is checked
//! against the plan catalogue and parked in the session until registration
//! issues a session, at which point the payment and membership are recorded.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;

use dentalab_core::{CurrencyCode, PaymentStatus, plan_by_id};

use crate::db::memberships::NewMembership;
use crate::db::payments::NewPayment;
use crate::db::{MembershipRepository, PaymentRepository};
use crate::models::{CurrentUser, PendingCapture, session::keys};
use crate::services::Notices;
use crate::state::AppState;
use crate::store::DataStore;

/// Method recorded on payments captured through the widget.
const PAYMENT_METHOD: &str = "payment_button";

/// Status the widget reports for a settled capture.
const COMPLETED: &str = "COMPLETED";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/capture", post(capture))
        .route("/error", post(widget_error))
}

/// Capture details posted by the widget's success callback.
#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    /// Payment reference (order ID) from the widget.
    pub reference: String,
    pub status: String,
    pub plan: String,
    pub amount: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub redirect: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error object posted by the widget's error callback.
#[derive(Debug, Deserialize)]
pub struct WidgetError {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reasons a capture is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("The payment was not completed (status {0}).")]
    NotCompleted(String),

    #[error("Unknown plan \"{0}\".")]
    UnknownPlan(String),

    #[error("The paid amount does not match the plan price.")]
    AmountMismatch,

    #[error("The payment currency does not match.")]
    CurrencyMismatch,

    #[error("The payment reference is missing.")]
    MissingReference,
}

/// Check a capture against the plan catalogue and configured currency.
///
/// # Errors
///
/// Returns the first check that fails.
pub fn validate_capture(
    request: &CaptureRequest,
    currency: CurrencyCode,
) -> Result<PendingCapture, CaptureError> {
    if !request.status.trim().eq_ignore_ascii_case(COMPLETED) {
        return Err(CaptureError::NotCompleted(request.status.clone()));
    }
    let reference = request.reference.trim();
    if reference.is_empty() {
        return Err(CaptureError::MissingReference);
    }
    let plan =
        plan_by_id(&request.plan).ok_or_else(|| CaptureError::UnknownPlan(request.plan.clone()))?;
    let amount: Decimal = request
        .amount
        .trim()
        .parse()
        .map_err(|_| CaptureError::AmountMismatch)?;
    if amount != plan.price {
        return Err(CaptureError::AmountMismatch);
    }
    if request.currency.trim().parse::<CurrencyCode>().ok() != Some(currency) {
        return Err(CaptureError::CurrencyMismatch);
    }

    Ok(PendingCapture {
        reference: reference.to_string(),
        plan: plan.id.to_string(),
        amount,
        currency: currency.code().to_string(),
        captured_at: Utc::now(),
    })
}

/// Accept a completed capture and continue to registration.
///
/// The details arrive unverified from the browser's payment widget and are
/// not confirmed with the payment provider. Only the status, the plan price
/// and the currency are checked before the capture is held for registration.
pub async fn capture(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CaptureRequest>,
) -> Response {
    let pending = match validate_capture(&request, state.config().payment.currency) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!(
                error = %e,
                reference = %request.reference,
                plan = %request.plan,
                "Rejected payment capture"
            );
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(MessageResponse {
                    message: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    tracing::info!(
        reference = %pending.reference,
        plan = %pending.plan,
        amount = %pending.amount,
        "Payment captured"
    );
    let redirect = format!("/auth/register?plan={}", pending.plan);
    if let Err(e) = session.insert(keys::PENDING_CAPTURE, &pending).await {
        tracing::error!(error = %e, reference = %pending.reference, "Failed to store capture");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MessageResponse {
                message: format!(
                    "Your payment {} went through but could not be linked to a new account. \
                     Contact support with this reference.",
                    pending.reference
                ),
            }),
        )
            .into_response();
    }

    Json(CaptureResponse { redirect }).into_response()
}

/// Log a widget failure and hand back a message to show.
pub async fn widget_error(Json(error): Json<WidgetError>) -> Json<MessageResponse> {
    tracing::warn!(
        plan = error.plan.as_deref().unwrap_or("-"),
        message = error.message.as_deref().unwrap_or("-"),
        "Payment widget error"
    );
    Json(MessageResponse {
        message: "The payment could not be processed. No charge was made; please try again."
            .to_string(),
    })
}

/// Record the membership and payment of a capture waiting in the session.
///
/// Best-effort: failures are logged and reported as warnings. The capture
/// is removed from the session either way so it is never recorded twice.
pub async fn record_pending_capture(
    store: &dyn DataStore,
    session: &Session,
    user: &CurrentUser,
    notices: &mut Notices,
) {
    let pending = match session.remove::<PendingCapture>(keys::PENDING_CAPTURE).await {
        Ok(Some(pending)) => pending,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read pending capture");
            return;
        }
    };

    let Some(plan) = plan_by_id(&pending.plan) else {
        tracing::warn!(plan = %pending.plan, "Pending capture names an unknown plan");
        return;
    };

    let today = pending.captured_at.date_naive();
    let memberships = MembershipRepository::new(store, &user.token);
    let membership_id = match memberships
        .create(&NewMembership {
            user_id: user.id(),
            plan: plan.id.to_string(),
            starts_on: today,
            ends_on: plan.ends_on(today),
            max_clinics: plan.max_clinics,
            max_dentists: plan.max_dentists,
            price: pending.amount,
        })
        .await
    {
        Ok(membership) => Some(membership.id),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user.id(), "Failed to record membership");
            notices.warning(format!(
                "Your {} membership could not be recorded: {}",
                plan.name,
                e.user_message()
            ));
            None
        }
    };

    let payments = PaymentRepository::new(store, &user.token);
    let payment = NewPayment {
        reference: pending.reference.clone(),
        amount: pending.amount,
        currency: pending.currency.clone(),
        method: PAYMENT_METHOD.to_string(),
        status: PaymentStatus::Completed,
        paid_at: pending.captured_at,
        user_id: user.id(),
        membership_id,
    };
    match payments.create(&payment).await {
        Ok(_) => {
            tracing::info!(reference = %pending.reference, user_id = %user.id(), "Payment recorded");
            if membership_id.is_some() {
                notices.success(format!("Your {} plan is active.", plan.name));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, reference = %pending.reference, "Failed to record payment");
            notices.warning(format!(
                "Payment {} could not be recorded: {}",
                pending.reference,
                e.user_message()
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(status: &str, plan: &str, amount: &str, currency: &str) -> CaptureRequest {
        CaptureRequest {
            reference: "8XY12345".to_string(),
            status: status.to_string(),
            plan: plan.to_string(),
            amount: amount.to_string(),
            currency: currency.to_string(),
        }
    }

    #[test]
    fn test_completed_capture_is_accepted() {
        let pending =
            validate_capture(&request("COMPLETED", "professional", "59.00", "USD"), CurrencyCode::USD)
                .unwrap();
        assert_eq!(pending.plan, "professional");
        assert_eq!(pending.amount, Decimal::new(59, 0));
        assert_eq!(pending.currency, "USD");
    }

    #[test]
    fn test_rejections() {
        let usd = CurrencyCode::USD;
        assert!(matches!(
            validate_capture(&request("PENDING", "basic", "29", "USD"), usd),
            Err(CaptureError::NotCompleted(_))
        ));
        assert!(matches!(
            validate_capture(&request("COMPLETED", "gold", "29", "USD"), usd),
            Err(CaptureError::UnknownPlan(_))
        ));
        assert_eq!(
            validate_capture(&request("COMPLETED", "basic", "1.00", "USD"), usd),
            Err(CaptureError::AmountMismatch)
        );
        assert_eq!(
            validate_capture(&request("COMPLETED", "basic", "29", "EUR"), usd),
            Err(CaptureError::CurrencyMismatch)
        );
    }
}
