use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::{ExercisePlanRepository, ExerciseSessionRepository, ExerciseSetStateRepository};
use glk_schemas::{ExercisePlan, ExerciseSession, ExerciseSetState, PlanSource, PlanStatus, SetStatus};

use crate::error::translate;
use crate::uow::PgUnitOfWork;

const ACTIVE_PLAN_CONSTRAINT: &str = "uq_exercise_plans_user_target_date_active";

fn row_to_plan(row: &sqlx::postgres::PgRow) -> anyhow::Result<ExercisePlan> {
    Ok(ExercisePlan {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        target_date: row.try_get("target_date")?,
        source: row
            .try_get::<String, _>("source")?
            .parse::<PlanSource>()
            .map_err(anyhow::Error::msg)?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<PlanStatus>()
            .map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ExercisePlanRepository for PgUnitOfWork {
    async fn get_active_by_user_and_date(
        &mut self,
        user_id: Uuid,
        target_date: NaiveDate,
    ) -> anyhow::Result<Option<ExercisePlan>> {
        let row = sqlx::query(
            "select * from exercise_plans where user_id = $1 and target_date = $2 and status = 'active'",
        )
        .bind(user_id)
        .bind(target_date)
        .fetch_optional(&mut **self.tx())
        .await?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn get_by_id(&mut self, plan_id: Uuid) -> anyhow::Result<Option<ExercisePlan>> {
        let row = sqlx::query("select * from exercise_plans where id = $1")
            .bind(plan_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn list_by_user(
        &mut self,
        user_id: Uuid,
        status: Option<PlanStatus>,
    ) -> anyhow::Result<Vec<ExercisePlan>> {
        let rows = sqlx::query(
            r#"
            select * from exercise_plans
            where user_id = $1 and ($2::text is null or status = $2)
            order by created_at asc
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .fetch_all(&mut **self.tx())
        .await?;
        rows.iter().map(row_to_plan).collect()
    }

    async fn save(&mut self, plan: ExercisePlan) -> anyhow::Result<ExercisePlan> {
        let row = sqlx::query(
            r#"
            insert into exercise_plans (id, user_id, target_date, source, status, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (id) do update set
                status = excluded.status,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(plan.id)
        .bind(plan.user_id)
        .bind(plan.target_date)
        .bind(plan.source.as_str())
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .fetch_one(&mut **self.tx())
        .await
        .map_err(|e| translate(e, ACTIVE_PLAN_CONSTRAINT))?;
        row_to_plan(&row)
    }
}

fn row_to_session(row: &sqlx::postgres::PgRow) -> anyhow::Result<ExerciseSession> {
    Ok(ExerciseSession {
        id: row.try_get("id")?,
        plan_id: row.try_get("plan_id")?,
        order_no: row.try_get("order_no")?,
        exercise_name: row.try_get("exercise_name")?,
        body_part: row.try_get("body_part")?,
        target_sets: row.try_get("target_sets")?,
        target_reps: row.try_get("target_reps")?,
        target_weight_kg: row.try_get("target_weight_kg")?,
        target_rest_sec: row.try_get("target_rest_sec")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ExerciseSessionRepository for PgUnitOfWork {
    async fn list_by_plan(&mut self, plan_id: Uuid) -> anyhow::Result<Vec<ExerciseSession>> {
        let rows = sqlx::query("select * from exercise_sessions where plan_id = $1 order by order_no asc")
            .bind(plan_id)
            .fetch_all(&mut **self.tx())
            .await?;
        rows.iter().map(row_to_session).collect()
    }

    async fn get_by_id(&mut self, session_id: Uuid) -> anyhow::Result<Option<ExerciseSession>> {
        let row = sqlx::query("select * from exercise_sessions where id = $1")
            .bind(session_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn save(&mut self, session: ExerciseSession) -> anyhow::Result<ExerciseSession> {
        let row = sqlx::query(
            r#"
            insert into exercise_sessions (
                id, plan_id, order_no, exercise_name, body_part, target_sets,
                target_reps, target_weight_kg, target_rest_sec, notes, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            on conflict (id) do update set
                target_sets = excluded.target_sets,
                target_reps = excluded.target_reps,
                target_weight_kg = excluded.target_weight_kg,
                target_rest_sec = excluded.target_rest_sec,
                notes = excluded.notes
            returning *
            "#,
        )
        .bind(session.id)
        .bind(session.plan_id)
        .bind(session.order_no)
        .bind(&session.exercise_name)
        .bind(&session.body_part)
        .bind(session.target_sets)
        .bind(session.target_reps)
        .bind(session.target_weight_kg)
        .bind(session.target_rest_sec)
        .bind(&session.notes)
        .bind(session.created_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_session(&row)
    }
}

fn row_to_set_state(row: &sqlx::postgres::PgRow) -> anyhow::Result<ExerciseSetState> {
    Ok(ExerciseSetState {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        set_no: row.try_get("set_no")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<SetStatus>()
            .map_err(anyhow::Error::msg)?,
        performed_reps: row.try_get("performed_reps")?,
        performed_weight_kg: row.try_get("performed_weight_kg")?,
        actual_rest_sec: row.try_get("actual_rest_sec")?,
        completed_at: row.try_get("completed_at")?,
        skipped_at: row.try_get("skipped_at")?,
    })
}

#[async_trait]
impl ExerciseSetStateRepository for PgUnitOfWork {
    async fn get(&mut self, session_id: Uuid, set_no: i32) -> anyhow::Result<Option<ExerciseSetState>> {
        let row = sqlx::query("select * from exercise_set_states where session_id = $1 and set_no = $2")
            .bind(session_id)
            .bind(set_no)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_set_state).transpose()
    }

    async fn list_by_session(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>> {
        let rows = sqlx::query("select * from exercise_set_states where session_id = $1 order by set_no asc")
            .bind(session_id)
            .fetch_all(&mut **self.tx())
            .await?;
        rows.iter().map(row_to_set_state).collect()
    }

    async fn list_pending(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>> {
        let rows = sqlx::query(
            "select * from exercise_set_states where session_id = $1 and status = 'pending' order by set_no asc",
        )
        .bind(session_id)
        .fetch_all(&mut **self.tx())
        .await?;
        rows.iter().map(row_to_set_state).collect()
    }

    async fn save(&mut self, state: ExerciseSetState) -> anyhow::Result<ExerciseSetState> {
        let row = sqlx::query(
            r#"
            insert into exercise_set_states (
                id, session_id, set_no, status, performed_reps, performed_weight_kg,
                actual_rest_sec, completed_at, skipped_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (id) do update set
                status = excluded.status,
                performed_reps = excluded.performed_reps,
                performed_weight_kg = excluded.performed_weight_kg,
                actual_rest_sec = excluded.actual_rest_sec,
                completed_at = excluded.completed_at,
                skipped_at = excluded.skipped_at
            returning *
            "#,
        )
        .bind(state.id)
        .bind(state.session_id)
        .bind(state.set_no)
        .bind(state.status.as_str())
        .bind(state.performed_reps)
        .bind(state.performed_weight_kg)
        .bind(state.actual_rest_sec)
        .bind(state.completed_at)
        .bind(state.skipped_at)
        .fetch_one(&mut **self.tx())
        .await
        .map_err(|e| translate(e, "uq_exercise_set_states_session_set_no"))?;
        row_to_set_state(&row)
    }
}
