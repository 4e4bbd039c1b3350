//! Sign-in gates, the back-office and the plan purchase flow.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use dentalab_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let response = app.client().get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_guest_is_sent_to_login() {
    let app = TestApp::new();
    let mut client = app.client();

    for path in ["/work-orders", "/clinics", "/admin"] {
        let response = client.get(path).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.location.as_deref(), Some("/auth/login"), "{path}");
    }
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestApp::new();
    app.add_user("lab@example.com", "client");
    let mut client = app.client();

    let response = client.sign_in("lab@example.com", "not-the-password").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(client.get("/work-orders").await.location.is_some());
}

#[tokio::test]
async fn test_signed_in_user_lands_on_work_orders() {
    let app = TestApp::new();
    app.add_user("lab@example.com", "client");
    let mut client = app.client();

    let response = client.sign_in("lab@example.com", PASSWORD).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/work-orders"));
    assert_eq!(client.follow(&response).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_admin_is_forbidden_from_backoffice() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let response = client.get("/admin").await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.contains("Administrator access required"));
}

#[tokio::test]
async fn test_admin_deactivates_another_account() {
    let app = TestApp::new();
    let (admin, mut client) = app.signed_in("admin@example.com", "admin").await;
    let member = app.add_user("lab@example.com", "client");

    let users = client.get("/admin/users?q=lab@").await;
    assert!(users.contains("lab@example.com"));
    assert!(!users.contains("admin@example.com"));

    let toggled = client
        .post_form(&format!("/admin/users/{member}/toggle?q=lab@"), &[])
        .await;
    assert_eq!(toggled.location.as_deref(), Some("/admin/users?q=lab%40"));
    let page = client.follow(&toggled).await;
    assert!(page.contains("was deactivated."), "{}", page.body);
    assert_eq!(
        app.store.row("usuarios", &member.to_string()).unwrap()["activo"],
        false
    );

    let own = client
        .post_form(&format!("/admin/users/{admin}/toggle"), &[])
        .await;
    let own = client.follow(&own).await;
    assert!(own.contains("You cannot deactivate your own account."));
    assert_eq!(
        app.store.row("usuarios", &admin.to_string()).unwrap()["activo"],
        true
    );
}

#[tokio::test]
async fn test_admin_delete_keeps_lab_records() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("admin@example.com", "admin").await;
    let member = app.add_user("lab@example.com", "client");
    app.store.seed(
        "clinicas",
        json!({ "user_id": member.to_string(), "nombre": "Smile Clinic" }),
    );

    let deleted = client
        .post_form(&format!("/admin/users/{member}/delete?q=lab@"), &[])
        .await;

    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    assert_eq!(deleted.location.as_deref(), Some("/admin/users?q=lab%40"));
    assert!(app.store.row("usuarios", &member.to_string()).is_none());
    assert_eq!(app.store.rows("clinicas").len(), 1);
}

#[tokio::test]
async fn test_captured_payment_is_recorded_on_registration() {
    let app = TestApp::new();
    let mut client = app.client();

    let captured = client
        .post_json(
            "/checkout/capture",
            &json!({
                "reference": "PAY-1",
                "status": "COMPLETED",
                "plan": "professional",
                "amount": "59.00",
                "currency": "USD",
            }),
        )
        .await;
    assert_eq!(captured.status, StatusCode::OK);
    assert!(captured.contains("/auth/register?plan=professional"));

    let registered = client
        .post_form(
            "/auth/register",
            &[
                ("email", "new@example.com"),
                ("password", PASSWORD),
                ("password_confirm", PASSWORD),
                ("name", "Luis Gil"),
                ("lab_name", "Gil Dental"),
                ("plan", "professional"),
            ],
        )
        .await;
    assert_eq!(registered.status, StatusCode::SEE_OTHER, "{}", registered.body);
    assert_eq!(registered.location.as_deref(), Some("/work-orders"));

    let memberships = app.store.rows("membresias");
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["plan"], "professional");
    assert_eq!(memberships[0]["max_clinicas"], 10);

    let payments = app.store.rows("pagos");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["referencia"], "PAY-1");
    assert_eq!(payments[0]["estado"], "completed");

    let board = client.follow(&registered).await;
    assert!(board.contains("Your Professional plan is active."), "{}", board.body);
}

#[tokio::test]
async fn test_capture_with_wrong_amount_is_refused() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .post_json(
            "/checkout/capture",
            &json!({
                "reference": "PAY-2",
                "status": "COMPLETED",
                "plan": "basic",
                "amount": "1.00",
                "currency": "USD",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let app = TestApp::new();
    app.auth.issue_expired_tokens();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let first = client.get("/clinics").await;
    assert_eq!(first.status, StatusCode::OK, "{:?}", first.location);
    let second = client.get("/work-orders").await;
    assert_eq!(second.status, StatusCode::OK);

    assert_eq!(app.auth.refreshes(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_signs_the_user_out() {
    let app = TestApp::new();
    app.auth.issue_expired_tokens();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;
    app.auth.revoke_refresh_tokens();

    let response = client.get("/clinics").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/auth/login"));

    let login = client.follow(&response).await;
    assert!(login.contains("Your session has expired. Sign in again."), "{}", login.body);
    assert_eq!(client.get("/work-orders").await.location.as_deref(), Some("/auth/login"));
}

#[tokio::test]
async fn test_deactivated_user_is_signed_out_on_next_request() {
    let app = TestApp::new();
    let (member, mut member_client) = app.signed_in("lab@example.com", "client").await;
    let (_, mut admin_client) = app.signed_in("admin@example.com", "admin").await;
    assert_eq!(member_client.get("/clinics").await.status, StatusCode::OK);

    admin_client
        .post_form(&format!("/admin/users/{member}/toggle"), &[])
        .await;

    let response = member_client.get("/clinics").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/auth/login"));
    let login = member_client.follow(&response).await;
    assert!(login.contains("Your account is inactive."), "{}", login.body);
}

#[tokio::test]
async fn test_deactivated_user_cannot_refresh() {
    let app = TestApp::new();
    app.auth.issue_expired_tokens();
    let (member, mut client) = app.signed_in("lab@example.com", "client").await;
    app.store
        .patch("usuarios", &member.to_string(), json!({ "activo": false }));

    let response = client.get("/clinics").await;

    assert_eq!(response.location.as_deref(), Some("/auth/login"));
    assert_eq!(app.auth.refreshes(), 1);
    let login = client.follow(&response).await;
    assert!(login.contains("Your account is inactive."), "{}", login.body);
}
