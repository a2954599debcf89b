// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketing campaign batch sender.
//!
//! Handles one batch of a campaign run:
//! 1. Check the campaign may still send (cancellation is a status change)
//! 2. Seed one pending delivery log per recipient, once
//! 3. Deliver pending logs in recipient order, pacing between sends
//! 4. Recount totals from the logs and finish the campaign when none remain
//!
//! The task handler queues the next batch while recipients remain.

use crate::config::Config;
use crate::db::CampaignStore;
use crate::error::{AppError, Result};
use crate::models::{Campaign, CampaignStatus, LogStatus, MessageLog, TenantSettings};
use crate::services::message_split::split_message;
use crate::services::phone::normalize_phone;
use crate::services::webhook::{CampaignWebhookPayload, MessageClient};
use crate::time_utils::{now_rfc3339, now_rfc3339_millis};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Randomized delays land within this many seconds of the base delay.
pub const DELAY_JITTER_SECS: u64 = 3;
/// Upper bound on recipients per batch, whatever the delay.
pub const MAX_BATCH_SIZE: usize = 50;

/// Knobs for the batch sender, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SenderSettings {
    /// Soft wall-clock budget for one batch
    pub time_budget: Duration,
    pub max_batch_size: usize,
    pub max_message_chars: usize,
    pub fallback_webhook_url: Option<String>,
    pub fallback_webhook_secret: Option<String>,
}

impl SenderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            time_budget: Duration::from_secs(config.batch_time_budget_secs),
            max_batch_size: MAX_BATCH_SIZE,
            max_message_chars: config.max_message_chars,
            fallback_webhook_url: config.default_webhook_url.clone(),
            fallback_webhook_secret: config.default_webhook_secret.clone(),
        }
    }
}

/// Recipients that fit in one batch: the time budget divided by the
/// per-recipient delay, at least one and at most `max`.
pub fn batch_size(delay_seconds: u64, time_budget: Duration, max: usize) -> usize {
    let per_recipient = delay_seconds.max(1);
    let fits = (time_budget.as_secs() / per_recipient) as usize;
    fits.clamp(1, max.max(1))
}

/// Pause before the next recipient: fixed, or uniform within
/// `[base - 3s, base + 3s]` (floored at zero) when randomized.
pub fn recipient_delay<R: Rng + ?Sized>(base_secs: u64, randomize: bool, rng: &mut R) -> Duration {
    if !randomize {
        return Duration::from_secs(base_secs);
    }
    let low = base_secs.saturating_sub(DELAY_JITTER_SECS) * 1000;
    let high = (base_secs + DELAY_JITTER_SECS) * 1000;
    Duration::from_millis(rng.gen_range(low..=high))
}

/// What is left of `delay` since the previous send at `last_sent_at`.
///
/// Lets the first send of a batch keep the pace set by the batch before
/// it. A missing or unreadable timestamp means no wait.
pub fn remaining_wait(last_sent_at: Option<&str>, delay: Duration, now: DateTime<Utc>) -> Duration {
    let Some(last) = last_sent_at.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) else {
        return Duration::ZERO;
    };
    let elapsed = (now - last.with_timezone(&Utc))
        .to_std()
        .unwrap_or(Duration::ZERO);
    delay.saturating_sub(elapsed)
}

/// Webhook to deliver through: campaign, then tenant, then service default.
pub fn resolve_webhook(
    campaign: &Campaign,
    tenant: Option<&TenantSettings>,
    settings: &SenderSettings,
) -> Option<(String, Option<String>)> {
    let non_blank = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

    if let Some(url) = non_blank(&campaign.webhook_url) {
        return Some((url, non_blank(&campaign.webhook_secret)));
    }
    if let Some(tenant) = tenant {
        if let Some(url) = non_blank(&tenant.marketing_webhook_url) {
            return Some((url, non_blank(&tenant.marketing_webhook_secret)));
        }
    }
    non_blank(&settings.fallback_webhook_url)
        .map(|url| (url, non_blank(&settings.fallback_webhook_secret)))
}

/// Pending logs for every recipient of a campaign.
pub fn seed_logs(campaign: &Campaign, now: &str) -> Vec<MessageLog> {
    campaign
        .recipients
        .iter()
        .enumerate()
        .map(|(i, phone)| MessageLog::pending(campaign, i as u32, phone, now))
        .collect()
}

/// What one batch did and where the campaign stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Recipients attempted in this batch
    pub processed: usize,
    /// Campaign-wide totals after the batch
    pub sent: u32,
    pub failed: u32,
    pub pending: u32,
    pub status: CampaignStatus,
}

impl BatchReport {
    /// The campaign is still sending and has recipients left.
    pub fn needs_continuation(&self) -> bool {
        self.status == CampaignStatus::Sending && self.pending > 0
    }
}

#[derive(Debug, Default)]
struct Totals {
    sent: u32,
    failed: u32,
    pending: u32,
}

fn count_logs(logs: &[MessageLog]) -> Totals {
    logs.iter().fold(Totals::default(), |mut t, log| {
        match log.status {
            LogStatus::Sent => t.sent += 1,
            LogStatus::Failed => t.failed += 1,
            LogStatus::Pending => t.pending += 1,
        }
        t
    })
}

/// Campaign status and delivery counts for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignProgress {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
    pub pending: u32,
    pub last_error: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Progress counted from the delivery logs, or from the recipient list
/// before any log exists.
pub fn progress(campaign: &Campaign, logs: &[MessageLog]) -> CampaignProgress {
    let total = campaign.recipients.len() as u32;
    let (sent, failed, pending) = if logs.is_empty() {
        let sent = campaign.sent_count;
        let failed = campaign.failed_count;
        (sent, failed, total.saturating_sub(sent + failed))
    } else {
        let t = count_logs(logs);
        (t.sent, t.failed, t.pending)
    };

    CampaignProgress {
        id: campaign.id.clone(),
        name: campaign.name.clone(),
        status: campaign.status,
        total,
        sent,
        failed,
        pending,
        last_error: campaign.last_error.clone(),
        started_at: campaign.started_at.clone(),
        completed_at: campaign.completed_at.clone(),
    }
}

/// Move a draft or paused campaign to `sending`.
pub fn start_sending(campaign: &mut Campaign, now: &str) -> Result<()> {
    if campaign.recipients.is_empty() {
        return Err(AppError::BadRequest("Campaign has no recipients".to_string()));
    }
    match campaign.status {
        CampaignStatus::Draft | CampaignStatus::Paused => {}
        CampaignStatus::Sending => {
            return Err(AppError::BadRequest("Campaign is already sending".to_string()))
        }
        finished => {
            return Err(AppError::BadRequest(format!(
                "Campaign already {:?}",
                finished
            )))
        }
    }

    campaign.status = CampaignStatus::Sending;
    campaign.total_recipients = campaign.recipients.len() as u32;
    campaign.last_error = None;
    if campaign.started_at.is_none() {
        campaign.started_at = Some(now.to_string());
    }
    campaign.updated_at = Some(now.to_string());
    Ok(())
}

/// Stop a campaign. Batches check the status and halt without work.
pub fn stop(campaign: &mut Campaign, status: CampaignStatus, now: &str) -> Result<()> {
    if campaign.status.is_finished() {
        return Err(AppError::BadRequest(format!(
            "Campaign already {:?}",
            campaign.status
        )));
    }
    if status == CampaignStatus::Paused && campaign.status == CampaignStatus::Paused {
        return Ok(());
    }

    campaign.status = status;
    if status.is_finished() {
        campaign.completed_at = Some(now.to_string());
    }
    campaign.updated_at = Some(now.to_string());
    Ok(())
}

/// Runs campaign batches against a store and the message webhook.
pub struct CampaignSender<S> {
    store: S,
    client: MessageClient,
    settings: SenderSettings,
}

impl<S: CampaignStore> CampaignSender<S> {
    pub fn new(store: S, client: MessageClient, settings: SenderSettings) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one batch of a campaign.
    ///
    /// Recipient-level failures are recorded in the logs, not returned.
    /// Errors mean the store or campaign lookup failed; retrying the batch
    /// is safe because only pending logs are delivered.
    pub async fn run_batch(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        tenant: Option<&TenantSettings>,
    ) -> Result<BatchReport> {
        let mut campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign_id)))?;

        if !campaign.status.accepts_batches() {
            tracing::info!(
                campaign_id,
                status = ?campaign.status,
                "Campaign not sending, batch skipped"
            );
            return Ok(BatchReport {
                processed: 0,
                sent: campaign.sent_count,
                failed: campaign.failed_count,
                pending: 0,
                status: campaign.status,
            });
        }

        let now = now_rfc3339();
        if campaign.status == CampaignStatus::Draft {
            campaign.status = CampaignStatus::Sending;
            campaign.started_at = Some(now.clone());
        }
        campaign.total_recipients = campaign.recipients.len() as u32;

        let Some((url, secret)) = resolve_webhook(&campaign, tenant, &self.settings) else {
            return self.fail_campaign(campaign, "No webhook URL configured").await;
        };
        if campaign.message.trim().is_empty() {
            return self.fail_campaign(campaign, "Campaign message is empty").await;
        }

        // Seed delivery logs only on the first batch of a run.
        let existing = self.store.list_message_logs(campaign_id).await?;
        if existing.is_empty() && !campaign.recipients.is_empty() {
            let logs = seed_logs(&campaign, &now);
            self.store.create_message_logs(&logs).await?;
            tracing::info!(campaign_id, count = logs.len(), "Seeded delivery logs");
        }

        let limit = batch_size(
            campaign.delay_seconds,
            self.settings.time_budget,
            self.settings.max_batch_size,
        );
        let pending = self.store.pending_message_logs(campaign_id, limit).await?;

        let started = Instant::now();
        let mut processed = 0usize;
        let mut attempted_send = false;

        for mut log in pending {
            if started.elapsed() >= self.settings.time_budget {
                tracing::info!(campaign_id, processed, "Batch time budget reached");
                break;
            }

            let phone = match normalize_phone(&log.phone) {
                Ok(phone) => phone,
                Err(e) => {
                    tracing::warn!(campaign_id, log_id = %log.id, "Invalid recipient phone");
                    log.mark_failed(0, e.to_string(), &now_rfc3339());
                    self.store.save_message_log(&log).await?;
                    processed += 1;
                    continue;
                }
            };

            let delay = recipient_delay(
                campaign.delay_seconds,
                campaign.randomize_delay,
                &mut rand::thread_rng(),
            );
            let wait = if attempted_send {
                delay
            } else {
                remaining_wait(campaign.last_sent_at.as_deref(), delay, Utc::now())
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            attempted_send = true;

            log.normalized_phone = Some(phone.clone());
            self.deliver(&campaign, &mut log, &phone, &url, secret.as_deref())
                .await;
            campaign.last_sent_at = Some(now_rfc3339_millis());
            self.store.save_message_log(&log).await?;
            processed += 1;
        }

        self.finish_batch(campaign, processed).await
    }

    /// Send every part of the message to one recipient, recording the
    /// result on the log. Stops at the first failed part.
    async fn deliver(
        &self,
        campaign: &Campaign,
        log: &mut MessageLog,
        phone: &str,
        url: &str,
        secret: Option<&str>,
    ) {
        let parts = split_message(&campaign.message, self.settings.max_message_chars);
        let total_parts = parts.len();

        for (i, part) in parts.iter().enumerate() {
            let payload = CampaignWebhookPayload {
                to: phone,
                message: part,
                campaign_id: &campaign.id,
                tenant_id: &campaign.tenant_id,
                log_id: &log.id,
                part: i + 1,
                total_parts,
            };

            if let Err(e) = self.client.post_campaign_part(url, secret, &payload).await {
                let reason = match e {
                    AppError::Webhook(text) => text,
                    other => other.to_string(),
                };
                tracing::warn!(
                    campaign_id = %campaign.id,
                    log_id = %log.id,
                    part = i + 1,
                    error = %reason,
                    "Campaign message delivery failed"
                );
                log.mark_failed(i as u32, reason, &now_rfc3339());
                return;
            }
        }

        log.mark_sent(total_parts as u32, &now_rfc3339());
        tracing::debug!(campaign_id = %campaign.id, log_id = %log.id, "Campaign message sent");
    }

    /// Recount totals from the logs and persist campaign progress.
    async fn finish_batch(&self, mut campaign: Campaign, processed: usize) -> Result<BatchReport> {
        let logs = self.store.list_message_logs(&campaign.id).await?;
        let totals = count_logs(&logs);
        let now = now_rfc3339();

        // A cancel or pause issued while this batch ran must survive.
        if let Some(latest) = self.store.get_campaign(&campaign.id).await? {
            if !latest.status.accepts_batches() {
                campaign.status = latest.status;
            }
        }

        campaign.sent_count = totals.sent;
        campaign.failed_count = totals.failed;
        campaign.updated_at = Some(now.clone());

        if totals.pending == 0 && campaign.status == CampaignStatus::Sending {
            campaign.status = CampaignStatus::from_totals(totals.sent, totals.failed);
            campaign.completed_at = Some(now);
            tracing::info!(
                campaign_id = %campaign.id,
                sent = totals.sent,
                failed = totals.failed,
                status = ?campaign.status,
                "Campaign finished"
            );
        }

        self.store.save_campaign(&campaign).await?;

        tracing::info!(
            campaign_id = %campaign.id,
            processed,
            sent = totals.sent,
            failed = totals.failed,
            pending = totals.pending,
            "Campaign batch complete"
        );

        Ok(BatchReport {
            processed,
            sent: totals.sent,
            failed: totals.failed,
            pending: totals.pending,
            status: campaign.status,
        })
    }

    async fn fail_campaign(&self, mut campaign: Campaign, reason: &str) -> Result<BatchReport> {
        tracing::error!(campaign_id = %campaign.id, reason, "Campaign cannot be sent");
        let now = now_rfc3339();
        campaign.status = CampaignStatus::Failed;
        campaign.last_error = Some(reason.to_string());
        campaign.completed_at = Some(now.clone());
        campaign.updated_at = Some(now);
        self.store.save_campaign(&campaign).await?;

        Ok(BatchReport {
            processed: 0,
            sent: campaign.sent_count,
            failed: campaign.failed_count,
            pending: 0,
            status: CampaignStatus::Failed,
        })
    }
}
