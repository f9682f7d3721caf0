use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub idempotency_key: String,
    pub event_id: Option<String>,
    pub raw_payload: Value,
    pub processed: bool,
    pub retry_count: i32,
    pub reason_code: Option<String>,
    pub signature_state: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A fully-formed webhook event ready for `handle_event`. Key derivation
/// (provider/event_type/event_id composition) happens at the transport
/// shell, not inside the core.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub provider: String,
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub idempotency_key: String,
    pub event_id: Option<String>,
    pub raw_payload: Value,
    pub reason_code: Option<String>,
    pub signature_state: Option<String>,
}
