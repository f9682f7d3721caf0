use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::WebhookEventRepository;
use glk_schemas::{NewWebhookEvent, WebhookEvent};

use crate::error::translate;
use crate::uow::PgUnitOfWork;

const PROVIDER_IDEMPOTENCY_CONSTRAINT: &str = "uq_webhook_events_provider_idempotency";

fn row_to_event(row: &sqlx::postgres::PgRow) -> anyhow::Result<WebhookEvent> {
    Ok(WebhookEvent {
        id: row.try_get("id")?,
        provider: row.try_get("provider")?,
        event_type: row.try_get("event_type")?,
        user_id: row.try_get("user_id")?,
        idempotency_key: row.try_get("idempotency_key")?,
        event_id: row.try_get("event_id")?,
        raw_payload: row.try_get("raw_payload")?,
        processed: row.try_get("processed")?,
        retry_count: row.try_get("retry_count")?,
        reason_code: row.try_get("reason_code")?,
        signature_state: row.try_get("signature_state")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl WebhookEventRepository for PgUnitOfWork {
    async fn get_by_provider_and_key(
        &mut self,
        provider: &str,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<WebhookEvent>> {
        let row = sqlx::query("select * from webhook_events where provider = $1 and idempotency_key = $2")
            .bind(provider)
            .bind(idempotency_key)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn get_by_provider_and_event_id(
        &mut self,
        provider: &str,
        event_id: &str,
    ) -> anyhow::Result<Option<WebhookEvent>> {
        let row = sqlx::query("select * from webhook_events where provider = $1 and event_id = $2")
            .bind(provider)
            .bind(event_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn insert(&mut self, event: NewWebhookEvent) -> anyhow::Result<WebhookEvent> {
        let row = sqlx::query(
            r#"
            insert into webhook_events (
                id, provider, event_type, user_id, idempotency_key, event_id,
                raw_payload, processed, retry_count, reason_code, signature_state, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, false, 0, $8, $9, now())
            returning *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.provider)
        .bind(&event.event_type)
        .bind(event.user_id)
        .bind(&event.idempotency_key)
        .bind(&event.event_id)
        .bind(&event.raw_payload)
        .bind(&event.reason_code)
        .bind(&event.signature_state)
        .fetch_one(&mut **self.tx())
        .await
        .map_err(|e| translate(e, PROVIDER_IDEMPOTENCY_CONSTRAINT))?;
        row_to_event(&row)
    }
}
