use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::OutboxEventRepository;
use glk_schemas::{NewOutboxEvent, OutboxEvent, OutboxStatus};

use crate::uow::PgUnitOfWork;

fn row_to_event(row: &sqlx::postgres::PgRow) -> anyhow::Result<OutboxEvent> {
    Ok(OutboxEvent {
        id: row.try_get("id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        aggregate_id: row.try_get("aggregate_id")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<OutboxStatus>()
            .map_err(anyhow::Error::msg)?,
        retry_count: row.try_get("retry_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl OutboxEventRepository for PgUnitOfWork {
    async fn append(&mut self, event: NewOutboxEvent) -> anyhow::Result<OutboxEvent> {
        let row = sqlx::query(
            r#"
            insert into outbox_events (
                id, aggregate_type, aggregate_id, event_type, payload, status,
                retry_count, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, 'pending', 0, now(), now())
            returning *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(event.event_type)
        .bind(&event.payload)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_event(&row)
    }

    /// Lease the oldest pending rows with `FOR UPDATE SKIP LOCKED` so
    /// concurrent drainers never double-claim, then flip them to
    /// `in_flight` before returning.
    async fn lease_pending(&mut self, limit: i64) -> anyhow::Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            with claimed as (
                select id from outbox_events
                where status = 'pending'
                order by created_at asc
                limit $1
                for update skip locked
            )
            update outbox_events
            set status = 'in_flight', updated_at = now()
            where id in (select id from claimed)
            returning *
            "#,
        )
        .bind(limit)
        .fetch_all(&mut **self.tx())
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    async fn mark_complete(&mut self, event_id: Uuid) -> anyhow::Result<Option<OutboxEvent>> {
        let row = sqlx::query(
            "update outbox_events set status = 'completed', updated_at = now() where id = $1 returning *",
        )
        .bind(event_id)
        .fetch_optional(&mut **self.tx())
        .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn mark_failed(&mut self, event_id: Uuid, reason: &str) -> anyhow::Result<Option<OutboxEvent>> {
        let row = sqlx::query(
            r#"
            update outbox_events
            set status = 'failed',
                retry_count = retry_count + 1,
                payload = payload || jsonb_build_object('failure_reason', $2::text),
                updated_at = now()
            where id = $1
            returning *
            "#,
        )
        .bind(event_id)
        .bind(reason)
        .fetch_optional(&mut **self.tx())
        .await?;
        row.as_ref().map(row_to_event).transpose()
    }
}
