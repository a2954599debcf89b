// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! WhatsApp message audit log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Stored WhatsApp message (`wa_messages`), with whatever context was resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaMessage {
    pub id: String,
    pub tenant_id: String,
    pub direction: MessageDirection,
    /// Counterpart phone number (E.164 when it could be normalized)
    pub phone: String,
    pub body: String,
    /// "dismissal", "help", "unknown_student", ...
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub guardian_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub dismissal_request_id: Option<String>,
    /// Provider timestamp for inbound messages
    #[serde(default)]
    pub provider_timestamp: Option<String>,
    /// Outbound delivery failure; `body` then holds only the parts sent
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: String,
}

impl WaMessage {
    pub fn new(
        tenant_id: &str,
        direction: MessageDirection,
        phone: &str,
        body: &str,
        now: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            direction,
            phone: phone.to_string(),
            body: body.to_string(),
            intent: None,
            guardian_id: None,
            student_id: None,
            dismissal_request_id: None,
            provider_timestamp: None,
            error: None,
            created_at: now.to_string(),
        }
    }
}
