//! Work order lifecycle through the board.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use dentalab_integration_tests::{Op, TestApp};

struct Seeded {
    clinic: String,
    dentist: String,
    service: String,
}

fn seed_registry(app: &TestApp, owner: &str) -> Seeded {
    let clinic = app.store.seed(
        "clinicas",
        json!({ "user_id": owner, "nombre": "Smile Clinic", "telefono": "555-0101" }),
    );
    let dentist = app.store.seed(
        "dentistas",
        json!({ "user_id": owner, "clinica_id": clinic, "nombre": "Dr. X", "especialidad": "Orthodontics" }),
    );
    let service = app.store.seed(
        "servicios",
        json!({ "user_id": owner, "nombre": "Zirconia crown", "precio_base": "100", "categoria": "fixed_prosthesis", "activo": true }),
    );
    Seeded {
        clinic,
        dentist,
        service,
    }
}

#[tokio::test]
async fn test_order_is_composed_saved_and_delivered() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let seeded = seed_registry(&app, &owner.to_string());

    let added = client
        .post_form(
            "/work-orders/cart/add",
            &[("service_id", seeded.service.as_str()), ("quantity", "2"), ("tooth", "11")],
        )
        .await;
    assert_eq!(added.status, StatusCode::SEE_OTHER);
    let board = client.follow(&added).await;
    assert!(board.contains("Zirconia crown"), "{}", board.body);

    let saved = client
        .post_form(
            "/work-orders",
            &[
                ("patient", "Jane Doe"),
                ("clinic_id", seeded.clinic.as_str()),
                ("dentist_id", seeded.dentist.as_str()),
            ],
        )
        .await;
    assert_eq!(saved.status, StatusCode::SEE_OTHER, "{}", saved.body);
    let board = client.follow(&saved).await;
    assert!(board.contains("Work order for Jane Doe saved. Total 200.00."), "{}", board.body);

    let orders = app.store.rows("ordenes_trabajo");
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order["paciente"], "Jane Doe");
    assert_eq!(order["estado"], "pending");
    assert_eq!(order["servicios"].as_array().unwrap().len(), 1);

    let id = order["id"].as_str().unwrap().to_string();
    let delivered = client
        .post_form(&format!("/work-orders/{id}/status"), &[("status", "delivered")])
        .await;
    assert_eq!(delivered.status, StatusCode::SEE_OTHER);
    let board = client.follow(&delivered).await;
    assert!(board.contains("Status changed to Delivered."), "{}", board.body);
    assert!(board.contains("<td class=\"num\">200.00</td>"));
    assert_eq!(app.store.row("ordenes_trabajo", &id).unwrap()["estado"], "delivered");
}

#[tokio::test]
async fn test_empty_cart_is_rejected_without_writing() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let seeded = seed_registry(&app, &owner.to_string());

    let page = client
        .post_form(
            "/work-orders",
            &[
                ("patient", "Jane Doe"),
                ("clinic_id", seeded.clinic.as_str()),
                ("dentist_id", seeded.dentist.as_str()),
            ],
        )
        .await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Add at least one service before saving the order."));
    assert_eq!(app.store.calls(Op::Insert, "ordenes_trabajo"), 0);
}

#[tokio::test]
async fn test_finalize_touches_only_open_orders_of_the_clinic() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let owner = owner.to_string();
    let seeded = seed_registry(&app, &owner);
    let other_clinic = app
        .store
        .seed("clinicas", json!({ "user_id": owner, "nombre": "Other Clinic" }));

    let order = |clinic: &str, status: &str| {
        json!({
            "user_id": owner,
            "paciente": "Patient",
            "clinica_id": clinic,
            "dentista_id": seeded.dentist,
            "servicios": [],
            "estado": status,
            "fecha_creacion": "2026-01-05",
            "fecha_entrega_estimada": "2026-01-12",
        })
    };
    let pending = app.store.seed("ordenes_trabajo", order(&seeded.clinic, "pending"));
    let in_production = app
        .store
        .seed("ordenes_trabajo", order(&seeded.clinic, "in-production"));
    let delivered = app.store.seed("ordenes_trabajo", order(&seeded.clinic, "delivered"));
    let elsewhere = app.store.seed("ordenes_trabajo", order(&other_clinic, "pending"));

    let confirm = client
        .get(&format!("/work-orders/finalize?clinic_id={}", seeded.clinic))
        .await;
    assert!(confirm.contains("Mark 2 open orders of Smile Clinic as finished?"), "{}", confirm.body);

    let finalized = client
        .post_form(&format!("/work-orders/finalize?clinic_id={}", seeded.clinic), &[])
        .await;
    assert_eq!(finalized.status, StatusCode::SEE_OTHER);
    let page = client.follow(&finalized).await;
    assert!(page.contains("2 orders marked as finished."), "{}", page.body);

    let status = |id: &str| app.store.row("ordenes_trabajo", id).unwrap()["estado"].clone();
    assert_eq!(status(&pending), "finished");
    assert_eq!(status(&in_production), "finished");
    assert_eq!(status(&delivered), "delivered");
    assert_eq!(status(&elsewhere), "pending");
}

#[tokio::test]
async fn test_invalid_quantity_leaves_cart_untouched() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let seeded = seed_registry(&app, &owner.to_string());

    let added = client
        .post_form(
            "/work-orders/cart/add",
            &[("service_id", seeded.service.as_str()), ("quantity", "0")],
        )
        .await;
    let board = client.follow(&added).await;

    assert!(board.contains("Quantity must be at least 1."));
    assert_eq!(app.store.calls(Op::Select, "servicios"), 1);
}

#[tokio::test]
async fn test_draft_header_survives_cart_changes() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let seeded = seed_registry(&app, &owner.to_string());

    let added = client
        .post_form(
            "/work-orders/cart/add",
            &[
                ("patient", "Jane Doe"),
                ("clinic_id", seeded.clinic.as_str()),
                ("dentist_id", seeded.dentist.as_str()),
                ("notes", "Shade A2"),
                ("service_id", seeded.service.as_str()),
                ("quantity", "1"),
            ],
        )
        .await;
    let board = client.follow(&added).await;

    assert!(board.contains("value=\"Jane Doe\""), "{}", board.body);
    assert!(board.contains("Shade A2"));
    assert!(board.contains(&format!("value=\"{}\" selected", seeded.clinic)));
    assert!(board.contains(&format!("value=\"{}\" selected", seeded.dentist)));

    let saved = client
        .post_form(
            "/work-orders",
            &[
                ("patient", "Jane Doe"),
                ("clinic_id", seeded.clinic.as_str()),
                ("dentist_id", seeded.dentist.as_str()),
            ],
        )
        .await;
    let board = client.follow(&saved).await;
    assert!(board.contains("Work order for Jane Doe saved."));
    assert!(!board.contains("value=\"Jane Doe\""), "draft kept after save");
}

#[tokio::test]
async fn test_dentist_picker_lists_only_the_chosen_clinic() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let owner = owner.to_string();
    let seeded = seed_registry(&app, &owner);
    let other_clinic = app
        .store
        .seed("clinicas", json!({ "user_id": owner, "nombre": "Other Clinic" }));
    app.store.seed(
        "dentistas",
        json!({ "user_id": owner, "clinica_id": other_clinic, "nombre": "Dr. Y" }),
    );

    let picker = client
        .get(&format!("/work-orders/dentists?clinic_id={}", seeded.clinic))
        .await;

    assert_eq!(picker.status, StatusCode::OK);
    assert!(picker.contains("id=\"dentist-picker\""));
    assert!(picker.contains("Dr. X"), "{}", picker.body);
    assert!(!picker.contains("Dr. Y"));
}

#[tokio::test]
async fn test_unreadable_order_does_not_hide_the_others() {
    let app = TestApp::new();
    let (owner, mut client) = app.signed_in("lab@example.com", "client").await;
    let owner = owner.to_string();
    let seeded = seed_registry(&app, &owner);

    let order = |patient: &str, status: &str, lines: serde_json::Value| {
        json!({
            "user_id": owner,
            "paciente": patient,
            "clinica_id": seeded.clinic,
            "dentista_id": seeded.dentist,
            "servicios": lines,
            "estado": status,
            "fecha_creacion": "2026-01-05",
            "fecha_entrega_estimada": "2026-01-12",
        })
    };
    app.store.seed(
        "ordenes_trabajo",
        order(
            "Ana Current",
            "pending",
            json!([{ "servicio_id": seeded.service, "nombre": "Zirconia crown", "cantidad": 1, "precio_unitario": "100", "precio": "100" }]),
        ),
    );
    app.store.seed(
        "ordenes_trabajo",
        order(
            "Luis Legacy",
            "pending",
            json!([{ "servicio_id": seeded.service, "nombre": "Zirconia crown", "cantidad": 2, "precio": "200" }]),
        ),
    );
    app.store.seed("ordenes_trabajo", order("Broken Row", "shipped", json!([])));

    let board = client.get("/work-orders").await;

    assert_eq!(board.status, StatusCode::OK);
    assert!(board.contains("Ana Current"), "{}", board.body);
    assert!(board.contains("Luis Legacy"));
    assert!(!board.contains("Broken Row"));
    assert!(board.contains("<td class=\"num\">200.00</td>"));
}

#[tokio::test]
async fn test_board_loads_the_double_submit_guard() {
    let app = TestApp::new();
    let (_, mut client) = app.signed_in("lab@example.com", "client").await;

    let board = client.get("/work-orders").await;

    assert!(board.contains("<script src=\"/static/forms.js\" defer></script>"));
}
