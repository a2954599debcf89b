// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound WhatsApp webhook: tenant resolution, signatures and payload
//! handling that completes without touching Firestore.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use smartkindy_messaging::services::signature::sign_body;
use tower::ServiceExt;

mod common;

const SECRET: &str = "tenant-secret";

fn app() -> axum::Router {
    let (app, _) = common::create_test_app(vec![
        common::tenant("t1", "alnoor", Some(SECRET)),
        common::tenant("t2", "unsigned", None),
    ]);
    app
}

fn webhook(tenant_id: Option<&str>, signature: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = tenant_id {
        builder = builder.header("x-tenant-id", id);
    }
    if let Some(sig) = signature {
        builder = builder.header("x-webhook-signature", sig);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn status_event() -> String {
    json!({ "event": "status", "data": { "from": "0551234567", "message": "" } }).to_string()
}

#[tokio::test]
async fn unresolved_tenant_is_not_found() {
    let response = app()
        .oneshot(webhook(None, None, &status_event()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reserved_subdomain_is_not_a_tenant() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .header(header::HOST, "www.smartkindy.com")
        .body(Body::from(status_event()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_or_wrong_signature_is_unauthorized() {
    let body = status_event();

    let response = app()
        .oneshot(webhook(Some("t1"), None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app()
        .oneshot(webhook(Some("t1"), Some("wrong-secret"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signature over a different body
    let other = sign_body(SECRET, b"{}").unwrap();
    let response = app()
        .oneshot(webhook(Some("t1"), Some(&other), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hmac_signed_non_message_event_is_ignored() {
    let body = status_event();
    let signature = sign_body(SECRET, body.as_bytes()).unwrap();

    let response = app()
        .oneshot(webhook(Some("t1"), Some(&signature), &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(json_body(response).await["status"], "ignored");
}

#[tokio::test]
async fn tenant_resolved_from_subdomain_with_shared_secret() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .header(header::HOST, "alnoor.smartkindy.com")
        .header("x-webhook-signature", SECRET)
        .body(Body::from(status_event()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_without_secret_accepts_unsigned_payload() {
    let response = app()
        .oneshot(webhook(Some("t2"), None, &status_event()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let response = app()
        .oneshot(webhook(Some("t2"), None, "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

#[tokio::test]
async fn message_without_data_or_valid_phone_is_bad_request() {
    let no_data = json!({ "event": "message" }).to_string();
    let response = app()
        .oneshot(webhook(Some("t2"), None, &no_data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bad_phone = json!({
        "event": "message.received",
        "data": { "from": "not-a-phone", "message": "استئذان سارة 12:30" }
    })
    .to_string();
    let response = app()
        .oneshot(webhook(Some("t2"), None, &bad_phone))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
