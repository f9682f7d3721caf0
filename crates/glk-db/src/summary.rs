use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::SummaryRepository;
use glk_schemas::{DailySummary, Trend, WeeklySummary};

use crate::uow::PgUnitOfWork;

fn row_to_daily(row: &sqlx::postgres::PgRow) -> anyhow::Result<DailySummary> {
    Ok(DailySummary {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        summary_date: row.try_get("summary_date")?,
        total_sets: row.try_get("total_sets")?,
        done_sets: row.try_get("done_sets")?,
        completion_rate: row.try_get("completion_rate")?,
        reading_completed: row.try_get("reading_completed")?,
        streak_days: row.try_get("streak_days")?,
        trend: row
            .try_get::<String, _>("trend")?
            .parse::<Trend>()
            .map_err(anyhow::Error::msg)?,
        computed_at: row.try_get("computed_at")?,
    })
}

fn row_to_weekly(row: &sqlx::postgres::PgRow) -> anyhow::Result<WeeklySummary> {
    Ok(WeeklySummary {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        week_avg_completion_rate: row.try_get("week_avg_completion_rate")?,
        streak_days: row.try_get("streak_days")?,
        trend: row
            .try_get::<String, _>("trend")?
            .parse::<Trend>()
            .map_err(anyhow::Error::msg)?,
        computed_at: row.try_get("computed_at")?,
    })
}

#[async_trait]
impl SummaryRepository for PgUnitOfWork {
    async fn get_daily(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<Option<DailySummary>> {
        let row = sqlx::query("select * from daily_summaries where user_id = $1 and summary_date = $2")
            .bind(user_id)
            .bind(summary_date)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_daily).transpose()
    }

    async fn upsert_daily(&mut self, summary: DailySummary) -> anyhow::Result<DailySummary> {
        let row = sqlx::query(
            r#"
            insert into daily_summaries (
                id, user_id, summary_date, total_sets, done_sets, completion_rate,
                reading_completed, streak_days, trend, computed_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            on conflict (user_id, summary_date) do update set
                total_sets = excluded.total_sets,
                done_sets = excluded.done_sets,
                completion_rate = excluded.completion_rate,
                reading_completed = excluded.reading_completed,
                streak_days = excluded.streak_days,
                trend = excluded.trend,
                computed_at = excluded.computed_at
            returning *
            "#,
        )
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(summary.summary_date)
        .bind(summary.total_sets)
        .bind(summary.done_sets)
        .bind(summary.completion_rate)
        .bind(summary.reading_completed)
        .bind(summary.streak_days)
        .bind(summary.trend.as_str())
        .bind(summary.computed_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_daily(&row)
    }

    async fn get_weekly(
        &mut self,
        user_id: Uuid,
        start_date: NaiveDate,
    ) -> anyhow::Result<Option<WeeklySummary>> {
        let row = sqlx::query("select * from weekly_summaries where user_id = $1 and start_date = $2")
            .bind(user_id)
            .bind(start_date)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_weekly).transpose()
    }

    async fn upsert_weekly(&mut self, summary: WeeklySummary) -> anyhow::Result<WeeklySummary> {
        let row = sqlx::query(
            r#"
            insert into weekly_summaries (
                id, user_id, start_date, end_date, week_avg_completion_rate,
                streak_days, trend, computed_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8)
            on conflict (user_id, start_date) do update set
                end_date = excluded.end_date,
                week_avg_completion_rate = excluded.week_avg_completion_rate,
                streak_days = excluded.streak_days,
                trend = excluded.trend,
                computed_at = excluded.computed_at
            returning *
            "#,
        )
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(summary.start_date)
        .bind(summary.end_date)
        .bind(summary.week_avg_completion_rate)
        .bind(summary.streak_days)
        .bind(summary.trend.as_str())
        .bind(summary.computed_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_weekly(&row)
    }

    async fn aggregate_exercise_sets(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            select
                count(*) as total_sets,
                count(*) filter (where ess.status = 'done') as done_sets
            from exercise_set_states ess
            join exercise_sessions es on es.id = ess.session_id
            join exercise_plans ep on ep.id = es.plan_id
            where ep.user_id = $1 and ep.target_date = $2
            "#,
        )
        .bind(user_id)
        .bind(summary_date)
        .fetch_one(&mut **self.tx())
        .await?;
        let total: i64 = row.try_get("total_sets")?;
        let done: i64 = row.try_get("done_sets")?;
        Ok((total, done))
    }

    async fn has_reading_completion(
        &mut self,
        user_id: Uuid,
        window_start_utc: DateTime<Utc>,
        window_end_utc: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            r#"
            select exists (
                select 1 from reading_logs
                where user_id = $1
                    and status in ('done', 'skipped')
                    and created_at >= $2
                    and created_at <= $3
            ) as "exists"
            "#,
        )
        .bind(user_id)
        .bind(window_start_utc)
        .bind(window_end_utc)
        .fetch_one(&mut **self.tx())
        .await?;
        row.try_get("exists").map_err(anyhow::Error::from)
    }
}
