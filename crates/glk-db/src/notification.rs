use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::NotificationRepository;
use glk_schemas::{Notification, NotificationStatus};

use crate::error::translate;
use crate::uow::PgUnitOfWork;

const IDEMPOTENCY_KEY_CONSTRAINT: &str = "notifications_idempotency_key_key";

fn row_to_notification(row: &sqlx::postgres::PgRow) -> anyhow::Result<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: row.try_get("kind")?,
        related_id: row.try_get("related_id")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<NotificationStatus>()
            .map_err(anyhow::Error::msg)?,
        schedule_at: row.try_get("schedule_at")?,
        sent_at: row.try_get("sent_at")?,
        retry_count: row.try_get("retry_count")?,
        idempotency_key: row.try_get("idempotency_key")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl NotificationRepository for PgUnitOfWork {
    async fn get_by_id(&mut self, notification_id: Uuid) -> anyhow::Result<Option<Notification>> {
        let row = sqlx::query("select * from notifications where id = $1")
            .bind(notification_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_notification).transpose()
    }

    async fn get_by_idempotency_key(
        &mut self,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<Notification>> {
        let row = sqlx::query("select * from notifications where idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_notification).transpose()
    }

    async fn save(&mut self, notification: Notification) -> anyhow::Result<Notification> {
        let row = sqlx::query(
            r#"
            insert into notifications (
                id, user_id, kind, related_id, status, schedule_at, sent_at,
                retry_count, idempotency_key, payload, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            on conflict (id) do update set
                status = excluded.status,
                sent_at = excluded.sent_at,
                retry_count = excluded.retry_count,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(notification.related_id)
        .bind(notification.status.as_str())
        .bind(notification.schedule_at)
        .bind(notification.sent_at)
        .bind(notification.retry_count)
        .bind(&notification.idempotency_key)
        .bind(&notification.payload)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .fetch_one(&mut **self.tx())
        .await
        .map_err(|e| translate(e, IDEMPOTENCY_KEY_CONSTRAINT))?;
        row_to_notification(&row)
    }
}
