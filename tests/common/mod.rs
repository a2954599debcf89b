// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use smartkindy_messaging::config::Config;
use smartkindy_messaging::db::{CampaignStore, FirestoreDb, InboundStore};
use smartkindy_messaging::error::AppError;
use smartkindy_messaging::middleware::auth::create_jwt;
use smartkindy_messaging::models::{
    Campaign, DismissalRequest, DismissalToken, Guardian, LogStatus, MessageLog, Student,
    TenantSettings, WaMessage,
};
use smartkindy_messaging::routes::create_router;
use smartkindy_messaging::services::{MessageClient, TasksService, TenantCache};
use smartkindy_messaging::AppState;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies and the given tenants
/// already cached. Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(tenants: Vec<TenantSettings>) -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::default(), tenants)
}

/// Like [`create_test_app`], with a custom configuration.
#[allow(dead_code)]
pub fn create_test_app_with_config(
    config: Config,
    tenants: Vec<TenantSettings>,
) -> (axum::Router, Arc<AppState>) {
    let tasks_service = TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.tasks_auth_token,
    );

    let tenant_cache = TenantCache::default();
    for tenant in tenants {
        tenant_cache.insert(tenant);
    }

    let state = Arc::new(AppState {
        config,
        db: test_db_offline(),
        tasks_service,
        message_client: MessageClient::new(),
        tenant_cache,
    });

    (create_router(state.clone()), state)
}

/// Tenant settings with an optional inbound webhook secret.
#[allow(dead_code)]
pub fn tenant(id: &str, slug: &str, webhook_secret: Option<&str>) -> TenantSettings {
    serde_json::from_value(serde_json::json!({
        "tenant_id": id,
        "slug": slug,
        "nursery_name": "روضة النور",
        "webhook_secret": webhook_secret
    }))
    .unwrap()
}

/// Bearer token for a staff user of `tenant_id`.
#[allow(dead_code)]
pub fn bearer(state: &AppState, tenant_id: &str) -> String {
    let token = create_jwt("staff-1", tenant_id, &state.config.jwt_signing_key).unwrap();
    format!("Bearer {}", token)
}

/// In-memory campaign storage.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    pub campaigns: Mutex<BTreeMap<String, Campaign>>,
    pub logs: Mutex<BTreeMap<String, MessageLog>>,
    /// Number of `create_message_logs` calls
    pub seed_calls: Mutex<usize>,
    /// Report no logs on the next listing, as a concurrent invocation that
    /// listed before the first seeding would
    pub stale_listing: Mutex<bool>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn with_campaign(campaign: Campaign) -> Self {
        let store = Self::default();
        store
            .campaigns
            .lock()
            .unwrap()
            .insert(campaign.id.clone(), campaign);
        store
    }

    pub fn campaign(&self, id: &str) -> Campaign {
        self.campaigns.lock().unwrap()[id].clone()
    }

    pub fn set_campaign(&self, campaign: Campaign) {
        self.campaigns
            .lock()
            .unwrap()
            .insert(campaign.id.clone(), campaign);
    }

    pub fn logs(&self) -> Vec<MessageLog> {
        self.logs.lock().unwrap().values().cloned().collect()
    }
}

impl CampaignStore for MemoryStore {
    async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>, AppError> {
        Ok(self.campaigns.lock().unwrap().get(campaign_id).cloned())
    }

    async fn save_campaign(&self, campaign: &Campaign) -> Result<(), AppError> {
        self.set_campaign(campaign.clone());
        Ok(())
    }

    async fn list_message_logs(&self, campaign_id: &str) -> Result<Vec<MessageLog>, AppError> {
        if std::mem::take(&mut *self.stale_listing.lock().unwrap()) {
            return Ok(Vec::new());
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn create_message_logs(&self, logs: &[MessageLog]) -> Result<(), AppError> {
        *self.seed_calls.lock().unwrap() += 1;
        let mut stored = self.logs.lock().unwrap();
        for log in logs {
            stored.entry(log.id.clone()).or_insert_with(|| log.clone());
        }
        Ok(())
    }

    async fn pending_message_logs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageLog>, AppError> {
        let mut pending: Vec<MessageLog> = self
            .logs
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.campaign_id == campaign_id && l.status == LogStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|l| l.recipient_index);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn save_message_log(&self, log: &MessageLog) -> Result<(), AppError> {
        self.logs.lock().unwrap().insert(log.id.clone(), log.clone());
        Ok(())
    }
}

/// In-memory guardians, students and what the inbound flow writes.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryInbound {
    pub guardians: Vec<Guardian>,
    pub students: Vec<Student>,
    pub requests: Mutex<Vec<DismissalRequest>>,
    pub tokens: Mutex<Vec<DismissalToken>>,
    pub messages: Mutex<Vec<WaMessage>>,
}

#[allow(dead_code)]
impl MemoryInbound {
    /// One guardian (`g1`, +966551234567) of tenant `t1` with the named
    /// children.
    pub fn family(children: &[(&str, &str)]) -> Self {
        Self {
            guardians: vec![Guardian {
                id: "g1".to_string(),
                tenant_id: "t1".to_string(),
                name: "Huda".to_string(),
                phone: "+966551234567".to_string(),
            }],
            students: children
                .iter()
                .map(|(id, name)| Student {
                    id: id.to_string(),
                    tenant_id: "t1".to_string(),
                    name: name.to_string(),
                    class_name: None,
                    guardian_ids: vec!["g1".to_string()],
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<DismissalRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<DismissalToken> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<WaMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl InboundStore for MemoryInbound {
    async fn find_guardian_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Guardian>, AppError> {
        Ok(self
            .guardians
            .iter()
            .find(|g| g.tenant_id == tenant_id && g.phone == phone)
            .cloned())
    }

    async fn get_students_for_guardian(
        &self,
        tenant_id: &str,
        guardian_id: &str,
    ) -> Result<Vec<Student>, AppError> {
        let mut students: Vec<Student> = self
            .students
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.guardian_ids.iter().any(|g| g == guardian_id))
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn create_dismissal(
        &self,
        request: &DismissalRequest,
        token: &DismissalToken,
    ) -> Result<(), AppError> {
        self.requests.lock().unwrap().push(request.clone());
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn log_wa_message(&self, message: &WaMessage) -> Result<(), AppError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
