use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::enums::NotificationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub related_id: Option<Uuid>,
    pub status: NotificationStatus,
    pub schedule_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub idempotency_key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit trail of provider-side delivery attempts for a notification.
/// The outbox drainer is the primary writer; this core only needs the
/// read path and the schema contract (see `notification_provider_codes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationProviderCode {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub provider: String,
    pub provider_status_code: Option<String>,
    pub provider_response: Option<Value>,
    pub captured_at: DateTime<Utc>,
}

/// Typed payload shapes for the notification kinds this core originates.
/// Constructed by the service layer, then flattened into the row's
/// generic `payload` JSON column via [`NotificationPayload::into_value`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationPayload {
    ExerciseStart {
        plan_id: Uuid,
        session_id: Uuid,
        set_no: i32,
    },
    ExerciseNextSet {
        plan_id: Uuid,
        session_id: Uuid,
        set_no: i32,
    },
    ReadingReminder {
        reading_plan_id: Uuid,
        reference_date: chrono::NaiveDate,
    },
    ReadingReminderRetry {
        reading_plan_id: Uuid,
        reference_date: chrono::NaiveDate,
        base_notification_id: Uuid,
    },
}

impl NotificationPayload {
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
