#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use body_note::repo::inmem::InMemRepo;
use body_note::repo::{AnalyticsRepo, SubscriptionRepo};
use body_note::{config, AppState};
use serde_json::{json, Value};
use std::sync::Arc;

macro_rules! app {
    ($repo:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(Arc::new($repo.clone()))))
                .configure(config),
        )
        .await
    };
}

#[actix_web::test]
async fn subscribe_then_resend() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/subscribe")
        .set_json(json!({ "email": "reader@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(body["message"].as_str().unwrap().contains("verify"));

    // same address, different case and padding
    let req = test::TestRequest::post()
        .uri("/api/subscribe")
        .set_json(json!({ "email": "  Reader@Example.com " }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn verification_token_is_single_use() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    repo.subscribe("known@example.com", "known-token").await.unwrap();

    let req = test::TestRequest::get().uri("/api/verify-subscription/known-token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/verify-subscription/known-token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri("/api/verify-subscription/never-issued").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/subscribe")
        .set_json(json!({ "email": "known@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["error"], "Email already subscribed");
}

#[actix_web::test]
async fn resend_replaces_token() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    repo.subscribe("late@example.com", "first-token").await.unwrap();
    repo.subscribe("late@example.com", "second-token").await.unwrap();

    let req = test::TestRequest::get().uri("/api/verify-subscription/first-token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    let req = test::TestRequest::get().uri("/api/verify-subscription/second-token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn invalid_email_rejected() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    for email in ["", "no-at-sign", "two@@example.com", "a@b"] {
        let req = test::TestRequest::post()
            .uri("/api/subscribe")
            .set_json(json!({ "email": email }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400, "{email}");
    }
}

#[actix_web::test]
async fn analytics_records_client_context() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .insert_header(("User-Agent", "body-note-test/1.0"))
        .insert_header(("x-session-id", "sess-123"))
        .set_json(json!({ "event": "entry_saved", "metadata": { "markers": 3 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 202);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .set_json(json!({ "event": "page_view" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 202);

    let events = repo.list_events().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "entry_saved");
    assert_eq!(events[0].user_agent.as_deref(), Some("body-note-test/1.0"));
    assert_eq!(events[0].session_id, "sess-123");
    assert_eq!(events[0].metadata["markers"], 3);
    assert_eq!(events[1].session_id.len(), 36);
    assert_eq!(events[1].metadata, json!({}));
}

#[actix_web::test]
async fn analytics_requires_event_name() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .set_json(json!({ "event": "  " }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .set_json(json!({ "event": "x", "metadata": [1, 2] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    assert!(repo.list_events().await.unwrap().is_empty());
}
