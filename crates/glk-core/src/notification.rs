//! Notification service (C5): `create_pending_notification` and
//! `mark_as_retried`. Looks up by idempotency key first — an existing row
//! is returned unchanged, never duplicated — and only inserts plus
//! appends an outbox event on a miss, all in the same commit.

use chrono::{DateTime, Utc};
use glk_schemas::{NewOutboxEvent, Notification, NotificationKind, NotificationStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::uow::UnitOfWork;

/// Look up by idempotency key (supplied or derived); on a hit, return the
/// existing row unchanged and append no outbox event. On a miss, insert and
/// append `NotificationScheduled` in the same commit.
pub async fn create_pending_notification(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    kind: NotificationKind,
    related_id: Option<Uuid>,
    schedule_at: DateTime<Utc>,
    idempotency_key: Option<String>,
    payload: Option<Value>,
) -> anyhow::Result<Notification> {
    let key = idempotency_key.unwrap_or_else(|| {
        derive_idempotency_key(kind, user_id, related_id, schedule_at)
    });

    if let Some(existing) = uow.notifications().get_by_idempotency_key(&key).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: kind.as_str().to_string(),
        related_id,
        status: NotificationStatus::Scheduled,
        schedule_at,
        sent_at: None,
        retry_count: 0,
        idempotency_key: key,
        payload: payload.unwrap_or_else(|| Value::Object(Default::default())),
        created_at: now,
        updated_at: now,
    };

    let saved = uow.notifications().save(notification).await?;

    uow.outbox_events()
        .append(NewOutboxEvent::notification_scheduled(
            saved.id,
            &saved.kind,
            saved.schedule_at,
        ))
        .await?;

    Ok(saved)
}

/// `retry_count += 1`, `status = RETRY_SCHEDULED`, `schedule_at = now()`,
/// append `NotificationRetryScheduled`. Returns `None` if the notification
/// does not exist — that's a success path, not an error.
pub async fn mark_as_retried(
    uow: &mut dyn UnitOfWork,
    notification_id: Uuid,
) -> anyhow::Result<Option<Notification>> {
    let Some(mut notification) = uow.notifications().get_by_id(notification_id).await? else {
        return Ok(None);
    };

    notification.retry_count += 1;
    notification.status = NotificationStatus::RetryScheduled;
    notification.schedule_at = Utc::now();
    notification.updated_at = Utc::now();

    let saved = uow.notifications().save(notification).await?;

    uow.outbox_events()
        .append(NewOutboxEvent::notification_retry_scheduled(
            saved.id,
            saved.retry_count,
        ))
        .await?;

    Ok(Some(saved))
}

fn derive_idempotency_key(
    kind: NotificationKind,
    user_id: Uuid,
    related_id: Option<Uuid>,
    schedule_at: DateTime<Utc>,
) -> String {
    let related = related_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "notification:{}:{}:{}:{}",
        kind.as_str(),
        user_id,
        related,
        schedule_at.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glk_testkit::InMemoryUnitOfWork;

    #[tokio::test]
    async fn replay_with_same_key_returns_existing_and_adds_no_outbox_event() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let schedule_at = Utc::now();

        let first = create_pending_notification(
            &mut uow,
            user_id,
            NotificationKind::ReadingReminder,
            None,
            schedule_at,
            Some("fixed-key".to_string()),
            None,
        )
        .await
        .unwrap();

        let before = uow.outbox_events().lease_pending(100).await.unwrap().len();

        let second = create_pending_notification(
            &mut uow,
            user_id,
            NotificationKind::ReadingReminder,
            None,
            schedule_at,
            Some("fixed-key".to_string()),
            None,
        )
        .await
        .unwrap();

        let after = uow.outbox_events().lease_pending(100).await.unwrap().len();

        assert_eq!(first.id, second.id);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn mark_as_retried_increments_count_and_reschedules() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();

        let created = create_pending_notification(
            &mut uow,
            user_id,
            NotificationKind::ReadingReminder,
            None,
            Utc::now(),
            None,
            None,
        )
        .await
        .unwrap();

        let retried = mark_as_retried(&mut uow, created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.status, NotificationStatus::RetryScheduled);
    }

    #[tokio::test]
    async fn mark_as_retried_on_missing_id_returns_none() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        assert!(mark_as_retried(&mut uow, Uuid::new_v4()).await.unwrap().is_none());
    }
}
