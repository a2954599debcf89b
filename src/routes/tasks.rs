// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users.
//! The tasks auth middleware checks the queue header and task token.

use crate::error::{AppError, Result};
use crate::models::TenantSettings;
use crate::services::campaign::{CampaignSender, SenderSettings};
use crate::services::tasks::CampaignBatchPayload;
use crate::services::tenant::TenantKey;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/campaign-batch", post(campaign_batch))
}

/// Run one campaign batch and queue the next while recipients remain.
///
/// Returning 500 makes Cloud Tasks retry the batch; only pending logs are
/// delivered again.
async fn campaign_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CampaignBatchPayload>,
) -> StatusCode {
    tracing::info!(
        tenant_id = %payload.tenant_id,
        campaign_id = %payload.campaign_id,
        batch = payload.batch,
        "Processing campaign batch from Cloud Task"
    );

    let lookup = state
        .tenant_cache
        .resolve(&state.db, &TenantKey::Id(payload.tenant_id.clone()))
        .await;
    let tenant = match batch_tenant(lookup) {
        Ok(tenant) => tenant,
        Err(e) => {
            tracing::error!(
                tenant_id = %payload.tenant_id,
                error = %e,
                "Tenant settings unavailable, retrying batch"
            );
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let sender = CampaignSender::new(
        state.db.clone(),
        state.message_client.clone(),
        SenderSettings::from_config(&state.config),
    );

    let report = match sender
        .run_batch(&payload.tenant_id, &payload.campaign_id, tenant.as_ref())
        .await
    {
        Ok(report) => report,
        Err(AppError::NotFound(reason)) => {
            // Deleted campaign - don't retry
            tracing::error!(campaign_id = %payload.campaign_id, reason = %reason, "Campaign missing, dropping task");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(
                campaign_id = %payload.campaign_id,
                error = %e,
                "Campaign batch failed"
            );
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if report.needs_continuation() {
        let next = payload.next();
        if let Err(e) = state
            .tasks_service
            .queue_campaign_batch(&state.config.api_url, &next)
            .await
        {
            tracing::error!(error = %e, "Failed to queue next campaign batch");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    tracing::info!(
        campaign_id = %payload.campaign_id,
        processed = report.processed,
        pending = report.pending,
        status = ?report.status,
        "Campaign batch handled"
    );

    StatusCode::OK
}

/// Tenant settings for a batch.
///
/// A tenant that no longer exists leaves only the campaign's own webhook.
/// Any other lookup failure is returned so the task is retried instead of
/// failing the campaign for want of the tenant's webhook.
fn batch_tenant(lookup: Result<TenantSettings>) -> Result<Option<TenantSettings>> {
    match lookup {
        Ok(tenant) => Ok(Some(tenant)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
