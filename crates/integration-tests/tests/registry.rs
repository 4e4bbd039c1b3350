//! Clinic and dentist registry behavior against a failing store.

use axum::http::StatusCode;
use serde_json::json;

use dentalab_integration_tests::{Failure, Op, TestApp};

#[tokio::test]
async fn test_clinic_is_created() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;

    let created = client
        .post_form(
            "/clinics",
            &[("name", "Smile Clinic"), ("phone", "555-0101"), ("email", "")],
        )
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    assert_eq!(created.location.as_deref(), Some("/clinics"));

    let page = client.follow(&created).await;
    assert!(page.contains("Clinic \"Smile Clinic\" created."), "{}", page.body);
    let rows = app.store.rows("clinicas");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_id"], owner.to_string());
}

#[tokio::test]
async fn test_clinic_delete_survives_dentist_cascade_failure() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let owner = owner.to_string();
    let clinic = app
        .store
        .seed("clinicas", json!({ "user_id": owner, "nombre": "Smile Clinic" }));
    app.store.seed(
        "dentistas",
        json!({ "user_id": owner, "clinica_id": clinic, "nombre": "Dr. X" }),
    );
    app.store.fail(
        Op::Delete,
        "dentistas",
        Failure::Api("foreign key check failed".to_string()),
    );

    let deleted = client.post_form(&format!("/clinics/{clinic}/delete"), &[]).await;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);

    let page = client.follow(&deleted).await;
    assert!(page.contains("dentists could not be deleted: foreign key check failed"), "{}", page.body);
    assert!(page.contains("deleted."));
    assert!(app.store.row("clinicas", &clinic).is_none());
    assert_eq!(app.store.rows("dentistas").len(), 1);
}

#[tokio::test]
async fn test_partial_load_failure_still_renders_clinics() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    app.store.seed(
        "clinicas",
        json!({ "user_id": owner.to_string(), "nombre": "Smile Clinic" }),
    );
    app.store
        .fail(Op::Select, "dentistas", Failure::Api("timeout".to_string()));

    let page = client.get("/clinics").await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Smile Clinic"));
    assert!(page.contains("Dentists could not be loaded: timeout"));
}

#[tokio::test]
async fn test_permission_denied_is_explained() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;
    app.store
        .fail(Op::Insert, "clinicas", Failure::PermissionDenied);

    let page = client.post_form("/clinics", &[("name", "Smile Clinic")]).await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("You do not have permission to perform this operation."));
    // The rejected form keeps its values.
    assert!(page.contains("value=\"Smile Clinic\""));
    assert!(app.store.rows("clinicas").is_empty());
}

#[tokio::test]
async fn test_other_labs_rows_are_not_listed() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;
    let stranger = app.add_user("other@example.com", "client");
    app.store.seed(
        "clinicas",
        json!({ "user_id": stranger.to_string(), "nombre": "Hidden Clinic" }),
    );

    let page = client.get("/clinics").await;

    assert!(!page.contains("Hidden Clinic"));
}
