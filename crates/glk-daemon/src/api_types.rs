//! JSON request/response DTOs for the HTTP surface. Kept separate from
//! `glk-schemas`/`glk-core` types since the wire shape is allowed to
//! diverge from the domain shape (e.g. flattening `Uuid`s, omitting
//! internal bookkeeping fields).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ResolveUserRequest {
    pub external_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveUserResponse {
    pub user_id: Uuid,
    pub external_id: String,
    pub display_name: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    pub user_id: Uuid,
    pub target_date: NaiveDate,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub order_no: i32,
    pub exercise_name: String,
    pub target_sets: i32,
}

#[derive(Debug, Serialize)]
pub struct GeneratePlanResponse {
    pub plan_id: Uuid,
    pub status: String,
    pub sessions: Vec<SessionView>,
    pub start_notification_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SubmitSetResultRequest {
    pub result: String,
    pub performed_reps: Option<i32>,
    pub performed_weight_kg: Option<f64>,
    pub actual_rest_sec: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitSetResultResponse {
    pub set_no: i32,
    pub status: String,
    pub next_pending_set_no: Option<i32>,
    pub notification_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleDailyReminderRequest {
    pub user_id: Uuid,
    pub reference_date: NaiveDate,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRetryReminderRequest {
    pub user_id: Uuid,
    pub reference_date: NaiveDate,
    pub base_notification_id: Uuid,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub result: String,
    pub notification_id: Option<Uuid>,
    pub schedule_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub event_type: String,
    pub idempotency_key: String,
    pub event_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub reason_code: Option<String>,
    pub signature_state: Option<String>,
    #[serde(default)]
    pub raw_payload: serde_json::Value,
    pub set_result: Option<EmbeddedSetResultRequest>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddedSetResultRequest {
    pub plan_id: Uuid,
    pub session_id: Uuid,
    pub set_no: i32,
    pub result: String,
    pub performed_reps: Option<i32>,
    pub performed_weight_kg: Option<f64>,
    pub actual_rest_sec: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub result: String,
    pub event_id: Uuid,
    pub set_result: Option<SubmitSetResultResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub user_id: Uuid,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DailySummaryResponse {
    pub user_id: Uuid,
    pub summary_date: NaiveDate,
    pub total_sets: i32,
    pub done_sets: i32,
    pub completion_rate: f64,
    pub reading_completed: bool,
    pub streak_days: i32,
    pub trend: String,
}

#[derive(Debug, Serialize)]
pub struct WeeklySummaryResponse {
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week_avg_completion_rate: f64,
    pub streak_days: i32,
    pub trend: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRetryRequest {
    pub notification_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct NotificationRetryResponse {
    pub notification_id: Uuid,
    pub status: String,
    pub retry_count: i32,
}
