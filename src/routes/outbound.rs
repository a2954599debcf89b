// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound WhatsApp sends from the dashboard.

use crate::db::InboundStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::TenantSettings;
use crate::services::phone::normalize_phone;
use crate::services::template::{render_template, TemplateContext, TemplateSet};
use crate::services::tenant::TenantKey;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Outbound routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/whatsapp/send", post(send_message))
}

/// Send either a named template or a literal message to one phone.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 32))]
    pub to: String,
    #[validate(length(min = 1, max = 64))]
    pub template: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub message: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub to: String,
    pub parts: usize,
    pub message_id: String,
}

/// Text to send: the named template, else the literal message, rendered
/// with the caller's variables either way.
pub fn message_text(
    req: &SendMessageRequest,
    templates: &TemplateSet,
    ctx: &TemplateContext,
) -> Result<String> {
    let text = match (&req.template, &req.message) {
        (Some(name), _) => templates
            .render(name, &req.variables, ctx)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown template: {}", name)))?,
        (None, Some(message)) => render_template(message, &req.variables, ctx),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either template or message is required".to_string(),
            ))
        }
    };

    if text.trim().is_empty() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }
    Ok(text)
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let to = normalize_phone(&req.to).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let tenant: TenantSettings = state
        .tenant_cache
        .resolve(&state.db, &TenantKey::Id(user.tenant_id.clone()))
        .await?;

    let templates = TemplateSet::for_tenant(&tenant);
    let ctx = TemplateContext {
        now: chrono::Local::now().naive_local(),
        nursery_name: tenant.nursery_name.clone(),
    };
    let text = message_text(&req, &templates, &ctx)?;

    let provider = tenant
        .whatsapp
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("WhatsApp provider not configured".to_string()))?;

    let delivery = state
        .message_client
        .send_whatsapp_text(provider, &to, &text, state.config.max_message_chars)
        .await;

    let logged = delivery
        .audit_record(&tenant.tenant_id, &to, &now_rfc3339())
        .map(|mut record| {
            record.intent = req.template.clone().or_else(|| Some("manual".to_string()));
            record
        });
    if let Some(logged) = &logged {
        if let Err(e) = state.db.log_wa_message(logged).await {
            tracing::warn!(error = %e, "Failed to log outbound WhatsApp message");
        }
    }

    let parts = delivery.into_result()?;
    let message_id = logged.map(|m| m.id).unwrap_or_default();

    tracing::info!(
        tenant_id = %tenant.tenant_id,
        user_id = %user.user_id,
        parts,
        "WhatsApp message sent"
    );

    Ok(Json(SendMessageResponse {
        success: true,
        to,
        parts,
        message_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> TemplateContext {
        TemplateContext {
            now: NaiveDate::from_ymd_opt(2026, 3, 10)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            nursery_name: "روضة النور".to_string(),
        }
    }

    fn request(template: Option<&str>, message: Option<&str>) -> SendMessageRequest {
        SendMessageRequest {
            to: "0551234567".to_string(),
            template: template.map(str::to_string),
            message: message.map(str::to_string),
            variables: HashMap::from([("name".to_string(), "Huda".to_string())]),
        }
    }

    #[test]
    fn literal_message_is_rendered() {
        let text = message_text(
            &request(None, Some("Hi {{name}}, {{currentTime}}")),
            &TemplateSet::default(),
            &ctx(),
        )
        .unwrap();
        assert_eq!(text, "Hi Huda, 09:05");
    }

    #[test]
    fn template_wins_over_message() {
        let text = message_text(
            &request(Some("help"), Some("ignored")),
            &TemplateSet::default(),
            &ctx(),
        )
        .unwrap();
        assert!(text.contains("روضة النور"));
    }

    #[test]
    fn unknown_template_or_nothing_is_bad_request() {
        assert!(matches!(
            message_text(&request(Some("nope"), None), &TemplateSet::default(), &ctx()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            message_text(&request(None, None), &TemplateSet::default(), &ctx()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn validation_rejects_empty_phone() {
        let mut req = request(None, Some("hi"));
        req.to = String::new();
        assert!(req.validate().is_err());
    }
}
