// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service for durable campaign continuation.
//!
//! Each campaign batch runs inside one task. While recipients remain
//! pending, the handler queues the next batch here instead of calling
//! itself, so a crashed batch is retried by the queue and resumes from
//! the pending delivery logs.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Header the task handler checks alongside the queue name.
pub const TASK_TOKEN_HEADER: &str = "x-task-token";

/// Payload of one campaign batch task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBatchPayload {
    pub tenant_id: String,
    pub campaign_id: String,
    /// Sequence number of this batch within the campaign run (1-based)
    #[serde(default = "first_batch")]
    pub batch: u32,
}

fn first_batch() -> u32 {
    1
}

impl CampaignBatchPayload {
    pub fn first(tenant_id: &str, campaign_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            campaign_id: campaign_id.to_string(),
            batch: 1,
        }
    }

    pub fn next(&self) -> Self {
        Self {
            batch: self.batch + 1,
            ..self.clone()
        }
    }
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    auth_token: String,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, auth_token: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::CAMPAIGN_QUEUE_NAME.to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    /// Queue a campaign batch.
    pub async fn queue_campaign_batch(
        &self,
        service_url: &str,
        payload: &CampaignBatchPayload,
    ) -> Result<()> {
        tracing::info!(
            tenant_id = %payload.tenant_id,
            campaign_id = %payload.campaign_id,
            batch = payload.batch,
            "Queuing campaign batch task"
        );
        self.queue_task(service_url, "/tasks/campaign-batch", payload)
            .await
    }

    fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        )
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                (TASK_TOKEN_HEADER.to_string(), self.auth_token.clone()),
            ]));

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(self.queue_path())
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_path_uses_campaign_queue() {
        let service = TasksService::new("proj", "me-central1", "tok");
        assert_eq!(
            service.queue_path(),
            "projects/proj/locations/me-central1/queues/campaign-delivery"
        );
    }

    #[test]
    fn next_batch_increments_sequence() {
        let first = CampaignBatchPayload::first("t1", "c1");
        let second = first.next();
        assert_eq!(first.batch, 1);
        assert_eq!(second.batch, 2);
        assert_eq!(second.campaign_id, "c1");
    }

    #[test]
    fn batch_defaults_to_one_when_missing() {
        let payload: CampaignBatchPayload =
            serde_json::from_str(r#"{"tenant_id":"t1","campaign_id":"c1"}"#).unwrap();
        assert_eq!(payload.batch, 1);
    }
}
