// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound HTTP clients for message delivery.
//!
//! Handles:
//! - Campaign webhook calls (automation platform relaying to WhatsApp)
//! - Direct WhatsApp provider calls for replies and one-off messages

use crate::error::AppError;
use crate::models::{MessageDirection, WaMessage, WhatsAppProvider};
use crate::services::message_split::split_message;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Response bodies are stored in delivery logs; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Header carrying the campaign webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// One message part posted to a campaign webhook.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignWebhookPayload<'a> {
    pub to: &'a str,
    pub message: &'a str,
    pub campaign_id: &'a str,
    pub tenant_id: &'a str,
    pub log_id: &'a str,
    /// 1-based part index
    pub part: usize,
    pub total_parts: usize,
}

#[derive(Debug, Serialize)]
struct ProviderMessage<'a> {
    to: &'a str,
    message: &'a str,
}

/// HTTP client for campaign webhooks and the WhatsApp provider.
#[derive(Clone)]
pub struct MessageClient {
    http: reqwest::Client,
}

impl Default for MessageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { http }
    }

    /// Post one campaign message part to a webhook.
    ///
    /// Any non-2xx response or transport failure is a [`AppError::Webhook`]
    /// carrying the captured text.
    pub async fn post_campaign_part(
        &self,
        url: &str,
        secret: Option<&str>,
        payload: &CampaignWebhookPayload<'_>,
    ) -> Result<(), AppError> {
        let mut request = self.http.post(url).json(payload);
        if let Some(secret) = secret {
            request = request.header(WEBHOOK_SECRET_HEADER, secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Webhook(truncate(&e.to_string())))?;

        check_response(response).await.map_err(AppError::Webhook)
    }

    /// Send a text message through a tenant's WhatsApp provider.
    pub async fn send_whatsapp(
        &self,
        provider: &WhatsAppProvider,
        to: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(&provider.api_url)
            .bearer_auth(&provider.api_token)
            .json(&ProviderMessage { to, message })
            .send()
            .await
            .map_err(|e| AppError::Provider(truncate(&e.to_string())))?;

        check_response(response).await.map_err(AppError::Provider)
    }

    /// Split `text` at `max_chars` and send the parts in order, stopping
    /// at the first failure.
    pub async fn send_whatsapp_text(
        &self,
        provider: &WhatsAppProvider,
        to: &str,
        text: &str,
        max_chars: usize,
    ) -> TextDelivery {
        let parts = split_message(text, max_chars);
        let total_parts = parts.len();
        let mut sent = Vec::with_capacity(total_parts);

        for part in parts {
            if let Err(e) = self.send_whatsapp(provider, to, &part).await {
                tracing::warn!(
                    part = sent.len() + 1,
                    total_parts,
                    error = %e,
                    "WhatsApp message part failed"
                );
                return TextDelivery {
                    sent,
                    total_parts,
                    error: Some(e),
                };
            }
            sent.push(part);
        }

        TextDelivery {
            sent,
            total_parts,
            error: None,
        }
    }
}

/// What happened to a split text message.
#[derive(Debug)]
pub struct TextDelivery {
    /// Parts delivered, in order
    pub sent: Vec<String>,
    pub total_parts: usize,
    /// Failure that stopped delivery
    pub error: Option<AppError>,
}

impl TextDelivery {
    /// The delivered text, parts joined by newlines.
    pub fn sent_text(&self) -> String {
        self.sent.join("\n")
    }

    /// Outbound audit log entry for the delivered parts, with the failure
    /// when delivery stopped early. `None` when nothing went out.
    pub fn audit_record(&self, tenant_id: &str, to: &str, now: &str) -> Option<WaMessage> {
        if self.sent.is_empty() {
            return None;
        }

        let mut record = WaMessage::new(
            tenant_id,
            MessageDirection::Outbound,
            to,
            &self.sent_text(),
            now,
        );
        record.error = self.error.as_ref().map(|e| {
            format!(
                "Sent {} of {} parts: {}",
                self.sent.len(),
                self.total_parts,
                e
            )
        });
        Some(record)
    }

    pub fn into_result(self) -> Result<usize, AppError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.sent.len()),
        }
    }
}

/// Return the captured error text for a non-2xx response.
async fn check_response(response: reqwest::Response) -> Result<(), String> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        tracing::warn!("Message delivery rate limited (429)");
    }
    Err(truncate(&format!("HTTP {}: {}", status, body.trim())))
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CampaignWebhookPayload<'static> {
        CampaignWebhookPayload {
            to: "+966551234567",
            message: "hello",
            campaign_id: "c1",
            tenant_id: "t1",
            log_id: "c1_000000",
            part: 1,
            total_parts: 1,
        }
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("boom"), "boom");
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY_CHARS + 1);
    }

    fn delivery(sent: &[&str], total_parts: usize, error: Option<AppError>) -> TextDelivery {
        TextDelivery {
            sent: sent.iter().map(|s| s.to_string()).collect(),
            total_parts,
            error,
        }
    }

    #[test]
    fn partial_delivery_records_sent_parts_and_error() {
        let partial = delivery(
            &["part one"],
            2,
            Some(AppError::Provider("HTTP 503".to_string())),
        );
        let record = partial
            .audit_record("t1", "+966551234567", "2026-03-10T09:00:00Z")
            .unwrap();

        assert_eq!(record.body, "part one");
        assert_eq!(record.direction, MessageDirection::Outbound);
        let error = record.error.unwrap();
        assert!(error.contains("1 of 2"));
        assert!(error.contains("503"));
    }

    #[test]
    fn complete_delivery_has_no_error() {
        let record = delivery(&["one", "two"], 2, None)
            .audit_record("t1", "+966551234567", "now")
            .unwrap();
        assert_eq!(record.body, "one\ntwo");
        assert!(record.error.is_none());
    }

    #[test]
    fn nothing_sent_is_not_recorded() {
        let failed = delivery(&[], 2, Some(AppError::Provider("down".to_string())));
        assert!(failed.audit_record("t1", "+966551234567", "now").is_none());
    }

    #[tokio::test]
    async fn campaign_part_posts_json_with_secret() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("x-webhook-secret", "s3cret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "to": "+966551234567",
                "campaign_id": "c1",
                "part": 1,
                "total_parts": 1
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = MessageClient::new();
        client
            .post_campaign_part(&format!("{}/hook", server.url()), Some("s3cret"), &payload())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn campaign_part_captures_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("provider exploded")
            .create_async()
            .await;

        let client = MessageClient::new();
        let err = client
            .post_campaign_part(&format!("{}/hook", server.url()), None, &payload())
            .await
            .unwrap_err();

        match err {
            AppError::Webhook(text) => {
                assert!(text.contains("500"));
                assert!(text.contains("provider exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn whatsapp_uses_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer wa-token")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "to": "+966551234567",
                "message": "مرحبا"
            })))
            .with_status(201)
            .create_async()
            .await;

        let provider = WhatsAppProvider {
            api_url: format!("{}/send", server.url()),
            api_token: "wa-token".to_string(),
        };
        MessageClient::new()
            .send_whatsapp(&provider, "+966551234567", "مرحبا")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn long_text_is_sent_in_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let provider = WhatsAppProvider {
            api_url: format!("{}/send", server.url()),
            api_token: "wa-token".to_string(),
        };
        let text = format!("{} {}", "a".repeat(8), "b".repeat(8));
        let delivery = MessageClient::new()
            .send_whatsapp_text(&provider, "+966551234567", &text, 10)
            .await;

        assert_eq!(delivery.total_parts, 2);
        assert_eq!(delivery.into_result().unwrap(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_part_reports_what_was_sent() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/send")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": "aaaaaaaa"
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/send")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": "bbbbbbbb"
            })))
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("POST", "/send")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": "cccccccc"
            })))
            .expect(0)
            .create_async()
            .await;

        let provider = WhatsAppProvider {
            api_url: format!("{}/send", server.url()),
            api_token: "wa-token".to_string(),
        };
        let text = ["a", "b", "c"].map(|c| c.repeat(8)).join(" ");
        let delivery = MessageClient::new()
            .send_whatsapp_text(&provider, "+966551234567", &text, 10)
            .await;

        assert_eq!(delivery.sent, vec!["aaaaaaaa".to_string()]);
        assert_eq!(delivery.total_parts, 3);
        assert!(matches!(delivery.error, Some(AppError::Provider(_))));
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }
}
