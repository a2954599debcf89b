// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks authentication middleware.

use crate::services::signature::constant_time_eq;
use crate::services::tasks::TASK_TOKEN_HEADER;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require the campaign queue header and the shared task token for
/// `/tasks/*` routes.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get("x-cloudtasks-queuename");
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::CAMPAIGN_QUEUE_NAME)
        .unwrap_or(false);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            "Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    let presented = request
        .headers()
        .get(TASK_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let expected = state.config.tasks_auth_token.as_str();

    if expected.is_empty() || !constant_time_eq(presented, expected) {
        tracing::warn!("Blocked tasks request: invalid task token");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
