//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

use crate::error::AppError;
use crate::models::{
    Campaign, DismissalRequest, DismissalToken, Guardian, MessageLog, Student, WaMessage,
};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const TENANT_SETTINGS: &str = "tenant_settings";
    pub const GUARDIANS: &str = "guardians";
    pub const STUDENTS: &str = "students";
    pub const CAMPAIGNS: &str = "marketing_campaigns";
    pub const MESSAGE_LOGS: &str = "marketing_message_logs";
    pub const DISMISSAL_REQUESTS: &str = "dismissal_requests";
    /// Confirmation PIN/QR tokens (keyed by request ID)
    pub const DISMISSAL_TOKENS: &str = "dismissal_tokens";
    pub const WA_MESSAGES: &str = "wa_messages";
}

/// Storage the campaign sender needs.
///
/// Implemented by [`FirestoreDb`]; tests use an in-memory store.
pub trait CampaignStore: Send + Sync {
    fn get_campaign(
        &self,
        campaign_id: &str,
    ) -> impl Future<Output = Result<Option<Campaign>, AppError>> + Send;

    fn save_campaign(&self, campaign: &Campaign)
        -> impl Future<Output = Result<(), AppError>> + Send;

    /// All delivery logs of a campaign.
    fn list_message_logs(
        &self,
        campaign_id: &str,
    ) -> impl Future<Output = Result<Vec<MessageLog>, AppError>> + Send;

    /// Create logs that do not exist yet. Existing logs are never
    /// overwritten, so racing seeders cannot reset a delivered recipient.
    fn create_message_logs(
        &self,
        logs: &[MessageLog],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Up to `limit` pending logs, in recipient order.
    fn pending_message_logs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MessageLog>, AppError>> + Send;

    fn save_message_log(&self, log: &MessageLog)
        -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Storage the inbound message flow needs.
///
/// Implemented by [`FirestoreDb`]; tests use an in-memory store.
pub trait InboundStore: Send + Sync {
    /// Guardian of a tenant with this E.164 phone number.
    fn find_guardian_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> impl Future<Output = Result<Option<Guardian>, AppError>> + Send;

    /// Students linked to a guardian, ordered by name.
    fn get_students_for_guardian(
        &self,
        tenant_id: &str,
        guardian_id: &str,
    ) -> impl Future<Output = Result<Vec<Student>, AppError>> + Send;

    /// Store a request together with its confirmation token.
    fn create_dismissal(
        &self,
        request: &DismissalRequest,
        token: &DismissalToken,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Append a message to the audit log.
    fn log_wa_message(&self, message: &WaMessage)
        -> impl Future<Output = Result<(), AppError>> + Send;
}
