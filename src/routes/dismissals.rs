// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pickup confirmation for dismissal requests.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DismissalRequest, DismissalStatus};
use crate::services::dismissal::{confirm, ConfirmRequest};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Dismissal routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/dismissals/{id}/confirm", post(confirm_dismissal))
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub id: String,
    pub status: DismissalStatus,
    pub student_name: String,
    pub pickup_time: String,
    pub confirmed_at: Option<String>,
}

impl From<DismissalRequest> for ConfirmResponse {
    fn from(request: DismissalRequest) -> Self {
        Self {
            id: request.id,
            status: request.status,
            student_name: request.student_name,
            pickup_time: request.pickup_time,
            confirmed_at: request.confirmed_at,
        }
    }
}

/// Confirm a pickup with the request's PIN or QR token.
async fn confirm_dismissal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(presented): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let not_found = || AppError::NotFound(format!("Dismissal request {} not found", id));

    let mut request = state
        .db
        .get_dismissal_request(&id)
        .await?
        .filter(|r| r.tenant_id == user.tenant_id)
        .ok_or_else(not_found)?;
    let mut token = state
        .db
        .get_dismissal_token(&id)
        .await?
        .filter(|t| t.tenant_id == user.tenant_id)
        .ok_or_else(not_found)?;

    let now = chrono::Local::now().naive_local();
    if let Err(e) = confirm(&mut request, &mut token, &presented, now, &now_rfc3339()) {
        tracing::warn!(request_id = %id, user_id = %user.user_id, reason = %e, "Dismissal confirmation rejected");
        return Err(e.into());
    }

    state.db.save_confirmation(&request, &token).await?;

    tracing::info!(
        request_id = %request.id,
        student_id = %request.student_id,
        user_id = %user.user_id,
        "Dismissal confirmed"
    );

    Ok(Json(request.into()))
}
