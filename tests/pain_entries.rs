#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use body_note::repo::inmem::InMemRepo;
use body_note::repo::PainEntryRepo;
use body_note::{config, AppState};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

fn markers() -> Value {
    json!([
        { "type": "sharp", "intensity": 4, "points": [{ "x": 10.5, "y": 20.25 }], "brushSize": 12 },
        { "type": "numbness", "intensity": 1, "points": [{ "x": 1.5, "y": 2.5 }, { "x": 3.5, "y": 4.5 }], "brushSize": 5 },
        { "type": "burning", "intensity": 5, "points": [{ "x": 99.5, "y": 0.5 }], "brushSize": 30 }
    ])
}

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
async fn create_assigns_unique_id_and_server_date() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let before: DateTime<Utc> = Utc::now();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/pain-entries")
            .set_json(json!({ "imageUrl": "knee/left-front.jpg", "painMarkers": markers(), "notes": "after run" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let v: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        let date: DateTime<Utc> = v["date"].as_str().unwrap().parse().unwrap();
        assert!(date >= before && date <= Utc::now());
        ids.push(v["id"].as_i64().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[actix_web::test]
async fn markers_round_trip_in_order() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/pain-entries")
        .set_json(json!({ "imageUrl": "data:image/png;base64,AAAA", "painMarkers": markers() }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["painMarkers"], markers());
    assert!(created["notes"].is_null());

    let req = test::TestRequest::get()
        .uri(&format!("/api/pain-entries/{}", created["id"]))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["painMarkers"], created["painMarkers"]);
    assert_eq!(
        serde_json::to_vec(&fetched["painMarkers"]).unwrap(),
        serde_json::to_vec(&created["painMarkers"]).unwrap()
    );
}

#[actix_web::test]
async fn list_is_newest_first() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    for i in 0..4 {
        let req = test::TestRequest::post()
            .uri("/api/pain-entries")
            .set_json(json!({ "imageUrl": format!("img-{i}.jpg"), "painMarkers": [] }))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    let req = test::TestRequest::get().uri("/api/pain-entries").to_request();
    let list: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.len(), 4);
    let dates: Vec<DateTime<Utc>> = list.iter().map(|e| e["date"].as_str().unwrap().parse().unwrap()).collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(list[0]["imageUrl"], "img-3.jpg");
    assert_eq!(list[3]["imageUrl"], "img-0.jpg");
}

#[actix_web::test]
async fn invalid_markers_are_rejected_without_storing() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let bad_payloads = [
        json!({ "imageUrl": "a.jpg", "painMarkers": [{ "type": "sharp", "intensity": 0, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 }] }),
        json!({ "imageUrl": "a.jpg", "painMarkers": [{ "type": "sharp", "intensity": 6, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 }] }),
        json!({ "imageUrl": "a.jpg", "painMarkers": [{ "type": "tingling", "intensity": 3, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 }] }),
        json!({ "imageUrl": "a.jpg", "painMarkers": [{ "type": "dull", "intensity": 3, "points": [], "brushSize": 4 }] }),
        json!({ "imageUrl": "a.jpg", "painMarkers": [{ "type": "dull", "intensity": -2, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 }] }),
        json!({ "painMarkers": [] }),
    ];
    for payload in bad_payloads {
        let req = test::TestRequest::post().uri("/api/pain-entries").set_json(&payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "payload should be rejected: {payload}");
        let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert!(body["error"].is_string());
        assert!(body["details"].as_array().is_some_and(|d| !d.is_empty()));
    }

    assert!(repo.list_pain_entries().await.unwrap().is_empty());
}

#[actix_web::test]
async fn validation_details_name_the_field() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/pain-entries")
        .set_json(json!({ "imageUrl": "a.jpg", "painMarkers": [
            { "type": "sharp", "intensity": 2, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 },
            { "type": "sharp", "intensity": 9, "points": [{"x": 1.0, "y": 1.0}], "brushSize": 4 }
        ] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["error"], "Invalid pain entry data");
    assert_eq!(body["details"][0]["path"], "painMarkers.1.intensity");
}

#[actix_web::test]
async fn missing_and_malformed_ids() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::get().uri("/api/pain-entries/999999").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri("/api/pain-entries/abc").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn oversized_body_is_refused() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let huge = "A".repeat(2 * 1024 * 1024 + 1);
    let body = json!({ "imageUrl": format!("data:image/png;base64,{huge}"), "painMarkers": [] }).to_string();
    let req = test::TestRequest::post()
        .uri("/api/pain-entries")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 413);
    assert!(repo.list_pain_entries().await.unwrap().is_empty());
}
