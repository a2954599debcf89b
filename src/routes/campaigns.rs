// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Campaign control routes for the dashboard.

use crate::db::CampaignStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Campaign, CampaignStatus};
use crate::services::campaign::{progress, start_sending, stop, CampaignProgress};
use crate::services::tasks::CampaignBatchPayload;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

/// Campaign routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/campaigns/{id}", get(get_campaign))
        .route("/api/campaigns/{id}/send", post(send_campaign))
        .route("/api/campaigns/{id}/pause", post(pause_campaign))
        .route("/api/campaigns/{id}/cancel", post(cancel_campaign))
}

/// Load a campaign owned by the caller's tenant.
///
/// Campaigns of other tenants are reported as missing.
async fn load_campaign(state: &AppState, user: &AuthUser, id: &str) -> Result<Campaign> {
    state
        .db
        .get_campaign(id)
        .await?
        .filter(|c| c.tenant_id == user.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))
}

async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CampaignProgress>> {
    let campaign = load_campaign(&state, &user, &id).await?;
    let logs = state.db.list_message_logs(&campaign.id).await?;
    Ok(Json(progress(&campaign, &logs)))
}

/// Start (or resume) delivery. The first batch runs in a Cloud Task.
async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CampaignProgress>)> {
    let mut campaign = load_campaign(&state, &user, &id).await?;
    let previous = campaign.clone();

    start_sending(&mut campaign, &now_rfc3339())?;
    state.db.save_campaign(&campaign).await?;

    let payload = CampaignBatchPayload::first(&campaign.tenant_id, &campaign.id);
    if let Err(e) = state
        .tasks_service
        .queue_campaign_batch(&state.config.api_url, &payload)
        .await
    {
        tracing::error!(campaign_id = %campaign.id, error = %e, "Failed to queue first campaign batch");
        // Put the campaign back so the user can retry the send.
        if let Err(db_err) = state.db.save_campaign(&previous).await {
            tracing::error!(error = %db_err, "Failed to restore campaign status");
        }
        return Err(e);
    }

    tracing::info!(
        campaign_id = %campaign.id,
        tenant_id = %campaign.tenant_id,
        user_id = %user.user_id,
        recipients = campaign.recipients.len(),
        "Campaign send started"
    );

    Ok((StatusCode::ACCEPTED, Json(progress(&campaign, &[]))))
}

async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CampaignProgress>> {
    update_status(&state, &user, &id, CampaignStatus::Paused).await
}

async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CampaignProgress>> {
    update_status(&state, &user, &id, CampaignStatus::Cancelled).await
}

async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    status: CampaignStatus,
) -> Result<Json<CampaignProgress>> {
    let mut campaign = load_campaign(state, user, id).await?;
    stop(&mut campaign, status, &now_rfc3339())?;
    state.db.save_campaign(&campaign).await?;

    tracing::info!(
        campaign_id = %campaign.id,
        user_id = %user.user_id,
        status = ?status,
        "Campaign stopped"
    );

    let logs = state.db.list_message_logs(&campaign.id).await?;
    Ok(Json(progress(&campaign, &logs)))
}
