use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::enums::OutboxStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An outbox row not yet assigned an id/timestamps, appended by a service
/// inside the ambient transaction.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub aggregate_type: &'static str,
    pub aggregate_id: Uuid,
    pub event_type: &'static str,
    pub payload: Value,
}

impl NewOutboxEvent {
    pub fn notification_scheduled(notification_id: Uuid, kind: &str, schedule_at: DateTime<Utc>) -> Self {
        NewOutboxEvent {
            aggregate_type: "notification",
            aggregate_id: notification_id,
            event_type: "NotificationScheduled",
            payload: serde_json::json!({
                "notification_id": notification_id,
                "kind": kind,
                "schedule_at": schedule_at,
            }),
        }
    }

    pub fn notification_retry_scheduled(notification_id: Uuid, retry_count: i32) -> Self {
        NewOutboxEvent {
            aggregate_type: "notification",
            aggregate_id: notification_id,
            event_type: "NotificationRetryScheduled",
            payload: serde_json::json!({
                "notification_id": notification_id,
                "retry_count": retry_count,
            }),
        }
    }

    pub fn webhook_received(webhook_id: Uuid, provider: &str, event_type: &str, event_id: Option<&str>) -> Self {
        NewOutboxEvent {
            aggregate_type: "webhook",
            aggregate_id: webhook_id,
            event_type: "WebhookReceived",
            payload: serde_json::json!({
                "provider": provider,
                "event_type": event_type,
                "event_id": event_id,
            }),
        }
    }
}
