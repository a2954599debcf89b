// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound WhatsApp webhook.
//!
//! Resolves the tenant (header or subdomain) and verifies the signature
//! over the raw body before the payload is even parsed; message events are
//! then handed to [`InboundProcessor`].

use crate::error::{AppError, Result};
use crate::models::TenantSettings;
use crate::services::inbound::{is_message_event, InboundAck, InboundEvent, InboundProcessor};
use crate::services::signature::{verify_signature, SIGNATURE_HEADER};
use crate::services::tenant::tenant_key;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

/// Inbound webhook routes (public; authenticated by tenant signature).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/whatsapp", post(receive_message))
}

/// Resolve the tenant for a webhook call and check its signature against
/// the raw body.
async fn authenticate(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<TenantSettings> {
    let key = tenant_key(headers, &state.config.base_domain)
        .ok_or_else(|| AppError::NotFound("Tenant not found".to_string()))?;
    let tenant = state.tenant_cache.resolve(&state.db, &key).await?;

    match tenant.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => {
            let presented = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
            if !verify_signature(secret, presented, body) {
                tracing::warn!(
                    tenant_id = %tenant.tenant_id,
                    "Rejected inbound webhook with invalid signature"
                );
                return Err(AppError::Unauthorized);
            }
        }
        None => {
            tracing::debug!(tenant_id = %tenant.tenant_id, "Tenant has no webhook secret, accepting unsigned payload");
        }
    }

    Ok(tenant)
}

/// Handle one inbound webhook event.
async fn receive_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundAck>> {
    let tenant = authenticate(&state, &headers, &body).await?;

    let event: InboundEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    if !is_message_event(&event.event) {
        tracing::debug!(event = %event.event, "Ignoring non-message webhook event");
        return Ok(Json(InboundAck::status("ignored")));
    }
    let data = event
        .data
        .ok_or_else(|| AppError::BadRequest("Missing message data".to_string()))?;

    let processor = InboundProcessor::new(
        state.db.clone(),
        state.message_client.clone(),
        state.config.max_message_chars,
    );
    let ack = processor
        .handle(&tenant, &data, chrono::Local::now().naive_local())
        .await?;
    Ok(Json(ack))
}
