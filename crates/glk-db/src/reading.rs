use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::{ReadingLogRepository, ReadingPlanRepository};
use glk_schemas::{ReadingLog, ReadingLogStatus, ReadingPlan};

use crate::uow::PgUnitOfWork;

fn row_to_plan(row: &sqlx::postgres::PgRow) -> anyhow::Result<ReadingPlan> {
    Ok(ReadingPlan {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        remind_time: row.try_get("remind_time")?,
        goal_minutes: row.try_get("goal_minutes")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ReadingPlanRepository for PgUnitOfWork {
    async fn get_by_user(&mut self, user_id: Uuid) -> anyhow::Result<Option<ReadingPlan>> {
        let row = sqlx::query(
            "select * from reading_plans where user_id = $1 order by created_at desc limit 1",
        )
        .bind(user_id)
        .fetch_optional(&mut **self.tx())
        .await?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn save(&mut self, plan: ReadingPlan) -> anyhow::Result<ReadingPlan> {
        let row = sqlx::query(
            r#"
            insert into reading_plans (id, user_id, remind_time, goal_minutes, enabled, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (id) do update set
                remind_time = excluded.remind_time,
                goal_minutes = excluded.goal_minutes,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(plan.id)
        .bind(plan.user_id)
        .bind(plan.remind_time)
        .bind(plan.goal_minutes)
        .bind(plan.enabled)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_plan(&row)
    }
}

fn row_to_log(row: &sqlx::postgres::PgRow) -> anyhow::Result<ReadingLog> {
    Ok(ReadingLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        reading_plan_id: row.try_get("reading_plan_id")?,
        book_title: row.try_get("book_title")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<ReadingLogStatus>()
            .map_err(anyhow::Error::msg)?,
        pages_read: row.try_get("pages_read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ReadingLogRepository for PgUnitOfWork {
    async fn list(
        &mut self,
        user_id: Uuid,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ReadingLog>> {
        let rows = sqlx::query(
            r#"
            select * from reading_logs
            where user_id = $1
                and ($2::date is null or created_at::date >= $2)
                and ($3::date is null or created_at::date <= $3)
            order by created_at asc
            "#,
        )
        .bind(user_id)
        .bind(from_date)
        .bind(to_date)
        .fetch_all(&mut **self.tx())
        .await?;
        rows.iter().map(row_to_log).collect()
    }

    async fn get_by_id(&mut self, log_id: Uuid) -> anyhow::Result<Option<ReadingLog>> {
        let row = sqlx::query("select * from reading_logs where id = $1")
            .bind(log_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_log).transpose()
    }

    async fn save(&mut self, log: ReadingLog) -> anyhow::Result<ReadingLog> {
        let row = sqlx::query(
            r#"
            insert into reading_logs (id, user_id, reading_plan_id, book_title, status, pages_read, created_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (id) do update set
                status = excluded.status,
                pages_read = excluded.pages_read
            returning *
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.reading_plan_id)
        .bind(&log.book_title)
        .bind(log.status.as_str())
        .bind(log.pages_read)
        .bind(log.created_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_log(&row)
    }
}
