#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App, HttpResponse};
use body_note::repo::inmem::InMemRepo;
use body_note::security::cors;
use body_note::{config, AppState, SecurityHeaders};
use std::sync::Arc;

#[actix_web::test]
async fn test_security_headers_present() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::new(false))
            .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::new()))))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/pain-entries").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("img-src 'self' data: blob:"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(headers.get("cross-origin-opener-policy").unwrap(), "same-origin");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
async fn test_hsts_enabled() {
    let sec = SecurityHeaders::default().with_hsts(true);
    let app = test::init_service(
        App::new()
            .wrap(sec)
            .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::new()))))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    let hsts = resp.headers().get("strict-transport-security").unwrap().to_str().unwrap();
    assert!(hsts.starts_with("max-age="));
}

#[actix_web::test]
async fn test_headers_on_error_responses() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::new(false))
            .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::new()))))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/injuries/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");
}

#[actix_web::test]
async fn test_handler_header_preserved() {
    let app = test::init_service(
        App::new().wrap(SecurityHeaders::new(false)).route(
            "/custom",
            web::get().to(|| async {
                HttpResponse::Ok()
                    .insert_header(("content-security-policy", "default-src 'none'"))
                    .finish()
            }),
        ),
    )
    .await;
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("content-security-policy").unwrap(), "default-src 'none'");
    assert_eq!(resp.headers().get("referrer-policy").unwrap(), "no-referrer");
}

#[actix_web::test]
async fn test_cors_sends_wildcard_origin() {
    let app = test::init_service(
        App::new()
            .wrap(cors())
            .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::new()))))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header(("Origin", "https://somewhere.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/api/pain-entries")
        .insert_header(("Origin", "https://elsewhere.example"))
        .insert_header(("Access-Control-Request-Method", "POST"))
        .insert_header(("Access-Control-Request-Headers", "content-type"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
}
