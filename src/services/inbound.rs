// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound WhatsApp message handling.
//!
//! Flow for one guardian message:
//! 1. Look up the guardian by phone and their linked students
//! 2. Classify the message; store a dismissal request when one resolves
//! 3. Log the inbound message with its resolved context
//! 4. Send the reply through the tenant's provider and log it
//!
//! Classification and reply rendering are pure; [`InboundProcessor`] adds
//! storage and delivery on top.

use crate::db::InboundStore;
use crate::error::{AppError, Result};
use crate::models::{DismissalToken, MessageDirection, Student, TenantSettings, WaMessage};
use crate::services::dismissal::{create_request, NewDismissal, SOURCE_WHATSAPP};
use crate::services::dismissal_parser::{match_student, parse_dismissal, DismissalIntent, StudentMatch};
use crate::services::phone::normalize_phone;
use crate::services::template::{self, vars, TemplateContext, TemplateSet};
use crate::services::webhook::MessageClient;
use crate::time_utils::{next_occurrence, now_rfc3339};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Webhook body posted by the WhatsApp automation platform.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    pub event: String,
    #[serde(default)]
    pub data: Option<InboundData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundData {
    pub from: String,
    #[serde(default)]
    pub message: String,
    /// Provider timestamp, string or epoch number
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl InboundData {
    pub fn timestamp_text(&self) -> Option<String> {
        match self.timestamp.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Events that carry a guardian message.
pub fn is_message_event(event: &str) -> bool {
    matches!(event, "message" | "message.received")
}

/// What a guardian's message resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Not a dismissal request; answer with the help text
    Help,
    /// Dismissal request naming no linked student
    UnknownStudent { intent: DismissalIntent },
    /// Dismissal request matching several linked students
    AmbiguousStudent {
        intent: DismissalIntent,
        candidates: Vec<String>,
    },
    /// Dismissal request for one student at a concrete pickup time
    Dismissal {
        intent: DismissalIntent,
        student: Student,
        pickup: NaiveDateTime,
    },
}

impl InboundOutcome {
    /// Intent label stored with the logged messages.
    pub fn intent(&self) -> &'static str {
        match self {
            InboundOutcome::Help => "help",
            InboundOutcome::UnknownStudent { .. } => "dismissal_unknown_student",
            InboundOutcome::AmbiguousStudent { .. } => "dismissal_ambiguous_student",
            InboundOutcome::Dismissal { .. } => "dismissal_request",
        }
    }
}

/// Classify a message from a guardian with the given linked students.
///
/// `now` is server-local time; a pickup time already past today rolls to
/// tomorrow.
pub fn classify(message: &str, students: &[Student], now: NaiveDateTime) -> InboundOutcome {
    let Some(intent) = parse_dismissal(message) else {
        return InboundOutcome::Help;
    };

    match match_student(intent.student_name.as_deref(), students) {
        StudentMatch::Found(student) => match next_occurrence(now, intent.hour, intent.minute) {
            Some(pickup) => InboundOutcome::Dismissal {
                student: student.clone(),
                pickup,
                intent,
            },
            None => InboundOutcome::Help,
        },
        StudentMatch::NotFound => InboundOutcome::UnknownStudent { intent },
        StudentMatch::Ambiguous(candidates) => InboundOutcome::AmbiguousStudent {
            candidates: candidates.iter().map(|s| s.name.clone()).collect(),
            intent,
        },
    }
}

/// Reply text for an outcome. `token` is the stored confirmation token
/// when a dismissal request was created.
pub fn render_reply(
    outcome: &InboundOutcome,
    token: Option<&DismissalToken>,
    templates: &TemplateSet,
    ctx: &TemplateContext,
) -> Option<String> {
    match outcome {
        InboundOutcome::Help => templates.render(template::HELP, &vars([]), ctx),
        InboundOutcome::UnknownStudent { intent } => templates.render(
            template::DISMISSAL_UNKNOWN_STUDENT,
            &vars([
                ("studentName", intent.student_name.clone().unwrap_or_default()),
                ("pickupTime", intent.time_text()),
            ]),
            ctx,
        ),
        InboundOutcome::AmbiguousStudent { intent, candidates } => templates.render(
            template::DISMISSAL_AMBIGUOUS_STUDENT,
            &vars([
                ("studentName", intent.student_name.clone().unwrap_or_default()),
                ("candidates", candidates.join("، ")),
                ("pickupTime", intent.time_text()),
            ]),
            ctx,
        ),
        InboundOutcome::Dismissal {
            intent, student, ..
        } => templates.render(
            template::DISMISSAL_CONFIRMATION,
            &vars([
                ("studentName", student.name.clone()),
                ("pickupTime", intent.time_text()),
                ("reason", intent.reason.clone().unwrap_or_default()),
                ("pin", token.map(|t| t.pin.clone()).unwrap_or_default()),
            ]),
            ctx,
        ),
    }
}

/// Acknowledgement returned to the automation platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissal_request_id: Option<String>,
}

impl InboundAck {
    pub fn status(status: &'static str) -> Self {
        Self {
            status,
            intent: None,
            dismissal_request_id: None,
        }
    }
}

/// Handles guardian messages for an authenticated tenant.
pub struct InboundProcessor<S> {
    store: S,
    client: MessageClient,
    max_message_chars: usize,
}

impl<S: InboundStore> InboundProcessor<S> {
    pub fn new(store: S, client: MessageClient, max_message_chars: usize) -> Self {
        Self {
            store,
            client,
            max_message_chars,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one guardian message.
    ///
    /// `now` is server-local time, used for pickup times and templates.
    /// Errors are lookup or storage failures; a failed reply is logged
    /// and swallowed because the request is already stored and failing
    /// the webhook would make the platform redeliver the message.
    pub async fn handle(
        &self,
        tenant: &TenantSettings,
        data: &InboundData,
        now: NaiveDateTime,
    ) -> Result<InboundAck> {
        let phone = normalize_phone(&data.from).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let received_at = now_rfc3339();

        let mut inbound = WaMessage::new(
            &tenant.tenant_id,
            MessageDirection::Inbound,
            &phone,
            &data.message,
            &received_at,
        );
        inbound.provider_timestamp = data.timestamp_text();

        let Some(guardian) = self
            .store
            .find_guardian_by_phone(&tenant.tenant_id, &phone)
            .await?
        else {
            tracing::info!(
                tenant_id = %tenant.tenant_id,
                "Message from unknown phone, no reply sent"
            );
            inbound.intent = Some("unknown_guardian".to_string());
            self.log_message(&inbound).await;
            return Ok(InboundAck::status("unknown_guardian"));
        };
        inbound.guardian_id = Some(guardian.id.clone());

        let students = self
            .store
            .get_students_for_guardian(&tenant.tenant_id, &guardian.id)
            .await?;
        let outcome = classify(&data.message, &students, now);

        let mut token = None;
        if let InboundOutcome::Dismissal {
            intent,
            student,
            pickup,
        } = &outcome
        {
            let new = NewDismissal {
                tenant_id: &tenant.tenant_id,
                guardian_id: &guardian.id,
                student,
                pickup: *pickup,
                reason: intent.reason.clone(),
                source: SOURCE_WHATSAPP,
            };
            let (request, created_token) =
                create_request(&new, &received_at, &mut rand::thread_rng());
            self.store.create_dismissal(&request, &created_token).await?;

            inbound.student_id = Some(student.id.clone());
            inbound.dismissal_request_id = Some(request.id.clone());
            token = Some(created_token);
        }

        inbound.intent = Some(outcome.intent().to_string());
        self.log_message(&inbound).await;

        tracing::info!(
            tenant_id = %tenant.tenant_id,
            guardian_id = %guardian.id,
            intent = outcome.intent(),
            "Inbound message classified"
        );

        let templates = TemplateSet::for_tenant(tenant);
        let ctx = TemplateContext {
            now,
            nursery_name: tenant.nursery_name.clone(),
        };
        if let Some(reply) = render_reply(&outcome, token.as_ref(), &templates, &ctx) {
            self.send_reply(tenant, &inbound, &reply).await;
        }

        Ok(InboundAck {
            status: "processed",
            intent: Some(outcome.intent()),
            dismissal_request_id: inbound.dismissal_request_id,
        })
    }

    /// Send a reply to the guardian and log whatever was delivered.
    async fn send_reply(&self, tenant: &TenantSettings, inbound: &WaMessage, reply: &str) {
        let Some(provider) = tenant.whatsapp.as_ref() else {
            tracing::warn!(tenant_id = %tenant.tenant_id, "No WhatsApp provider configured, reply not sent");
            return;
        };

        let delivery = self
            .client
            .send_whatsapp_text(provider, &inbound.phone, reply, self.max_message_chars)
            .await;
        if let Some(e) = &delivery.error {
            tracing::error!(tenant_id = %tenant.tenant_id, error = %e, "Failed to send WhatsApp reply");
        }

        if let Some(mut outbound) = delivery.audit_record(&tenant.tenant_id, &inbound.phone, &now_rfc3339()) {
            outbound.intent = inbound.intent.clone();
            outbound.guardian_id = inbound.guardian_id.clone();
            outbound.student_id = inbound.student_id.clone();
            outbound.dismissal_request_id = inbound.dismissal_request_id.clone();
            self.log_message(&outbound).await;
        }
    }

    async fn log_message(&self, message: &WaMessage) {
        if let Err(e) = self.store.log_wa_message(message).await {
            tracing::warn!(error = %e, direction = ?message.direction, "Failed to log WhatsApp message");
        }
    }
}
