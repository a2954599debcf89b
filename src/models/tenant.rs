// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tenant configuration and the guardian/student records the messaging
//! flows read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// WhatsApp provider credentials for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppProvider {
    /// Endpoint accepting `{to, message}` JSON
    pub api_url: String,
    pub api_token: String,
}

/// Per-tenant settings (`tenant_settings`, keyed by tenant ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant_id: String,
    /// Subdomain label, e.g. `alnoor` for `alnoor.smartkindy.com`
    pub slug: String,
    pub nursery_name: String,
    /// Shared secret for inbound webhook signatures
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Template overrides keyed by template name
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub whatsapp: Option<WhatsAppProvider>,
    #[serde(default)]
    pub marketing_webhook_url: Option<String>,
    #[serde(default)]
    pub marketing_webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardian {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// E.164
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub guardian_ids: Vec<String>,
}
