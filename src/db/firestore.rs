// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Tenant settings (templates, secrets, provider credentials)
//! - Guardians and students (read-only lookups for inbound messages)
//! - Marketing campaigns and their delivery logs
//! - Dismissal requests and confirmation tokens
//! - WhatsApp message audit log

use crate::db::{collections, CampaignStore, InboundStore};
use crate::error::AppError;
use crate::models::{
    Campaign, DismissalRequest, DismissalToken, Guardian, MessageLog, Student, TenantSettings,
    WaMessage,
};
use firestore::errors::FirestoreError;
use futures_util::{stream, FutureExt, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Tenant Operations ───────────────────────────────────────

    /// Get settings for a tenant by ID.
    pub async fn get_tenant_settings(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantSettings>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TENANT_SETTINGS)
            .obj()
            .one(tenant_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a tenant by its subdomain label.
    pub async fn find_tenant_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<TenantSettings>, AppError> {
        let mut matches: Vec<TenantSettings> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TENANT_SETTINGS)
            .filter(|q| q.for_all([q.field("slug").eq(slug)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    // ─── Dismissal Operations ────────────────────────────────────

    pub async fn get_dismissal_request(
        &self,
        request_id: &str,
    ) -> Result<Option<DismissalRequest>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DISMISSAL_REQUESTS)
            .obj()
            .one(request_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_dismissal_token(
        &self,
        request_id: &str,
    ) -> Result<Option<DismissalToken>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DISMISSAL_TOKENS)
            .obj()
            .one(request_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist a confirmed request and its used token atomically.
    pub async fn save_confirmation(
        &self,
        request: &DismissalRequest,
        token: &DismissalToken,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::DISMISSAL_REQUESTS)
            .document_id(&request.id)
            .object(request)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add request: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::DISMISSAL_TOKENS)
            .document_id(&token.request_id)
            .object(token)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add token: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }
}

// ─── Inbound Operations ──────────────────────────────────────────

impl InboundStore for FirestoreDb {
    async fn find_guardian_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Guardian>, AppError> {
        let mut matches: Vec<Guardian> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GUARDIANS)
            .filter(|q| {
                q.for_all([
                    q.field("tenant_id").eq(tenant_id),
                    q.field("phone").eq(phone),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    async fn get_students_for_guardian(
        &self,
        tenant_id: &str,
        guardian_id: &str,
    ) -> Result<Vec<Student>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::STUDENTS)
            .filter(|q| {
                q.for_all([
                    q.field("tenant_id").eq(tenant_id),
                    q.field("guardian_ids").array_contains(guardian_id),
                ])
            })
            .order_by([("name", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a new dismissal request together with its confirmation token.
    ///
    /// Both documents are written in one transaction so a request never
    /// exists without a way to confirm it.
    async fn create_dismissal(
        &self,
        request: &DismissalRequest,
        token: &DismissalToken,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::DISMISSAL_REQUESTS)
            .document_id(&request.id)
            .object(request)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add request: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::DISMISSAL_TOKENS)
            .document_id(&token.request_id)
            .object(token)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add token: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            request_id = %request.id,
            student_id = %request.student_id,
            "Dismissal request stored"
        );
        Ok(())
    }

    async fn log_wa_message(&self, message: &WaMessage) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WA_MESSAGES)
            .document_id(&message.id)
            .object(message)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Campaign Operations ─────────────────────────────────────────

impl CampaignStore for FirestoreDb {
    async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CAMPAIGNS)
            .obj()
            .one(campaign_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_campaign(&self, campaign: &Campaign) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CAMPAIGNS)
            .document_id(&campaign.id)
            .object(campaign)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_message_logs(&self, campaign_id: &str) -> Result<Vec<MessageLog>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGE_LOGS)
            .filter(|q| q.for_all([q.field("campaign_id").eq(campaign_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    /// Writes are create-only: a log that already exists (seeded by a
    /// concurrent or earlier invocation) keeps its delivery status.
    async fn create_message_logs(&self, logs: &[MessageLog]) -> Result<(), AppError> {
        let client = self.get_client()?;

        let writes: Vec<_> = logs
            .iter()
            .map(|log| {
                async move {
                    let result: Result<MessageLog, _> = client
                        .fluent()
                        .insert()
                        .into(collections::MESSAGE_LOGS)
                        .document_id(&log.id)
                        .object(log)
                        .execute()
                        .await;

                    match result {
                        Ok(_) => Ok(true),
                        Err(FirestoreError::DataConflictError(_)) => Ok(false),
                        Err(e) => Err(AppError::Database(e.to_string())),
                    }
                }
                .boxed()
            })
            .collect();

        let created = stream::iter(writes)
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>, AppError>>()?;

        let skipped = created.iter().filter(|c| !**c).count();
        if skipped > 0 {
            tracing::info!(skipped, "Delivery logs already existed, left untouched");
        }
        Ok(())
    }

    async fn pending_message_logs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageLog>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGE_LOGS)
            .filter(|q| {
                q.for_all([
                    q.field("campaign_id").eq(campaign_id),
                    q.field("status").eq("pending"),
                ])
            })
            .order_by([(
                "recipient_index",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .limit(limit as u32)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_message_log(&self, log: &MessageLog) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MESSAGE_LOGS)
            .document_id(&log.id)
            .object(log)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
