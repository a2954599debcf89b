// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Dismissal (early pickup) request models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissalStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// Stored dismissal request (`dismissal_requests`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalRequest {
    pub id: String,
    pub tenant_id: String,
    pub student_id: String,
    pub student_name: String,
    pub guardian_id: String,
    /// Requested pickup moment, server-local (`YYYY-MM-DDTHH:MM:SS`)
    pub pickup_time: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: DismissalStatus,
    /// "whatsapp" or "dashboard"
    pub source: String,
    pub created_at: String,
    #[serde(default)]
    pub confirmed_at: Option<String>,
}

/// Confirmation credentials for a dismissal request (`dismissal_tokens`).
///
/// Keyed by request ID; one token per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalToken {
    pub request_id: String,
    pub tenant_id: String,
    /// Four-digit PIN read out at the gate
    pub pin: String,
    /// URL-safe token encoded in the QR code
    pub qr_token: String,
    /// RFC3339 (UTC)
    pub expires_at: String,
    #[serde(default)]
    pub used_at: Option<String>,
}
