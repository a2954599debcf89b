// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for Cloud Task handlers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

fn batch_request(queue: Option<&str>, token: Option<&str>) -> Request<Body> {
    let payload = json!({ "tenant_id": "t1", "campaign_id": "c1", "batch": 1 });

    let mut builder = Request::builder()
        .method("POST")
        .uri("/tasks/campaign-batch")
        .header("content-type", "application/json");
    if let Some(queue) = queue {
        builder = builder.header("x-cloudtasks-queuename", queue);
    }
    if let Some(token) = token {
        builder = builder.header("x-task-token", token);
    }
    builder
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_campaign_batch_no_header_forbidden() {
    let (app, state) = common::create_test_app(vec![]);
    let token = state.config.tasks_auth_token.clone();

    let response = app.oneshot(batch_request(None, Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_campaign_batch_wrong_queue_forbidden() {
    let (app, state) = common::create_test_app(vec![]);
    let token = state.config.tasks_auth_token.clone();

    let response = app
        .oneshot(batch_request(Some("activity-processing"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_campaign_batch_missing_token_forbidden() {
    let (app, _) = common::create_test_app(vec![]);

    let response = app
        .oneshot(batch_request(Some("campaign-delivery"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_campaign_batch_wrong_token_forbidden() {
    let (app, _) = common::create_test_app(vec![]);

    let response = app
        .oneshot(batch_request(Some("campaign-delivery"), Some("guess")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_campaign_batch_authorized_reaches_handler() {
    let (app, state) = common::create_test_app(vec![common::tenant("t1", "alnoor", None)]);
    let token = state.config.tasks_auth_token.clone();

    let response = app
        .oneshot(batch_request(Some("campaign-delivery"), Some(&token)))
        .await
        .unwrap();

    // Offline database: the handler runs and asks Cloud Tasks to retry.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_campaign_batch_tenant_lookup_failure_is_retried() {
    // Tenant not cached and the database unreachable: the batch must be
    // retried rather than run without the tenant's webhook.
    let (app, state) = common::create_test_app(vec![]);
    let token = state.config.tasks_auth_token.clone();

    let response = app
        .oneshot(batch_request(Some("campaign-delivery"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
