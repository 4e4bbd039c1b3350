//! Lab settings and the live tax preview.

use axum::http::StatusCode;

use dentalab_integration_tests::TestApp;

#[tokio::test]
async fn test_vat_preview_deducts_from_subtotal() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let panel = client
        .get("/settings/preview?tax_mode=vat&tax_percent=19&previous_mode=vat")
        .await;

    assert_eq!(panel.status, StatusCode::OK);
    assert!(panel.contains("100,000.00"));
    assert!(panel.contains("19,000.00"));
    assert!(panel.contains("81,000.00"));
}

#[tokio::test]
async fn test_mode_switch_snaps_to_default_percentage() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let panel = client
        .get("/settings/preview?tax_mode=withholding&tax_percent=19&previous_mode=vat")
        .await;

    assert!(panel.contains("value=\"14.5\""), "{}", panel.body);
    assert!(panel.contains("14,500.00"));
    assert!(panel.contains("85,500.00"));
}

#[tokio::test]
async fn test_settings_page_renders_without_saved_config() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let page = client.get("/settings").await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("id=\"tax-panel\""));
}

#[tokio::test]
async fn test_preview_requires_sign_in() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client.get("/settings/preview?tax_mode=vat").await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/auth/login"));
}

#[tokio::test]
async fn test_rejected_save_keeps_showing_the_stored_logo() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let config = app.store.seed(
        "configuracion_laboratorio",
        serde_json::json!({
            "user_id": owner.to_string(),
            "nombre": "Dental Works",
            "logo": "data:image/png;base64,iVBORw0KGgo=",
            "tipo_impuesto": "vat",
            "porcentaje_impuesto": "19",
        }),
    );

    let page = client
        .post_multipart(
            "/settings",
            &[
                ("config_id", config.as_str()),
                ("name", ""),
                ("email", "not-an-address"),
                ("tax_mode", "vat"),
                ("tax_percent", "19"),
            ],
        )
        .await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("base64,iVBORw0KGgo="), "{}", page.body);
    assert!(page.contains("alt=\"Current logo\""));
}
