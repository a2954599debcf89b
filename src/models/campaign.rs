// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Marketing campaign and per-recipient delivery log models.

use serde::{Deserialize, Serialize};

/// Lifecycle of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Sending,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Whether a batch may run for a campaign in this status.
    pub fn accepts_batches(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Sending)
    }

    /// Terminal states are never left again.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            CampaignStatus::Cancelled | CampaignStatus::Completed | CampaignStatus::Failed
        )
    }

    /// Final status once every recipient has been attempted.
    pub fn from_totals(sent: u32, failed: u32) -> Self {
        if sent == 0 && failed > 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Completed
        }
    }
}

/// Stored campaign record in Firestore (`marketing_campaigns`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign ID (also used as document ID)
    pub id: String,
    /// Owning tenant
    pub tenant_id: String,
    pub name: String,
    /// Message body, sent as-is (split if longer than the part limit)
    pub message: String,
    /// Raw recipient phone numbers as entered in the dashboard
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Base delay between recipients, in seconds
    #[serde(default)]
    pub delay_seconds: u64,
    /// Add ±3s jitter around `delay_seconds`
    #[serde(default)]
    pub randomize_delay: bool,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub sent_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub total_recipients: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Last webhook call of any batch (RFC3339, millisecond precision)
    #[serde(default)]
    pub last_sent_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Delivery state of one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Pending,
    Sent,
    Failed,
}

/// Per-recipient delivery log (`marketing_message_logs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    /// Document ID, see [`MessageLog::document_id`]
    pub id: String,
    pub campaign_id: String,
    pub tenant_id: String,
    /// Position in the campaign's recipient list (processing order)
    pub recipient_index: u32,
    /// Phone as entered
    pub phone: String,
    #[serde(default)]
    pub normalized_phone: Option<String>,
    pub status: LogStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub parts_sent: u32,
    #[serde(default)]
    pub sent_at: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl MessageLog {
    /// Deterministic document ID, so seeding the same campaign twice
    /// writes the same documents.
    pub fn document_id(campaign_id: &str, recipient_index: u32) -> String {
        format!("{}_{:06}", campaign_id, recipient_index)
    }

    /// Fresh pending log for one recipient.
    pub fn pending(campaign: &Campaign, recipient_index: u32, phone: &str, now: &str) -> Self {
        Self {
            id: Self::document_id(&campaign.id, recipient_index),
            campaign_id: campaign.id.clone(),
            tenant_id: campaign.tenant_id.clone(),
            recipient_index,
            phone: phone.to_string(),
            normalized_phone: None,
            status: LogStatus::Pending,
            error: None,
            parts_sent: 0,
            sent_at: None,
            created_at: now.to_string(),
            updated_at: None,
        }
    }

    pub fn mark_sent(&mut self, parts: u32, now: &str) {
        self.status = LogStatus::Sent;
        self.parts_sent = parts;
        self.error = None;
        self.sent_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
    }

    pub fn mark_failed(&mut self, parts: u32, error: impl Into<String>, now: &str) {
        self.status = LogStatus::Failed;
        self.parts_sent = parts;
        self.error = Some(error.into());
        self.updated_at = Some(now.to_string());
    }
}
