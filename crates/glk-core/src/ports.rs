//! Repository contracts (C2). Every aggregate gets one narrow trait; the
//! sqlx-backed implementations live in `glk-db`, the `HashMap`-backed test
//! doubles in `glk-testkit`. No method here ever takes a raw connection or
//! transaction handle — participation in the ambient transaction is the
//! `UnitOfWork`'s job (see `uow.rs`), not a repository concern.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use glk_schemas::{
    DailySummary, ExercisePlan, ExerciseSession, ExerciseSetState, Notification, NewOutboxEvent,
    NewWebhookEvent, OutboxEvent, PlanStatus, ReadingLog, ReadingPlan, User, UserProfile,
    WebhookEvent, WeeklySummary,
};
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send {
    async fn get_by_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_by_external_id(&mut self, external_id: &str) -> anyhow::Result<Option<User>>;
    async fn save(&mut self, user: User) -> anyhow::Result<User>;
}

#[async_trait]
pub trait UserProfileRepository: Send {
    async fn get_by_user_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn save(&mut self, profile: UserProfile) -> anyhow::Result<UserProfile>;
}

#[async_trait]
pub trait ExercisePlanRepository: Send {
    async fn get_active_by_user_and_date(
        &mut self,
        user_id: Uuid,
        target_date: NaiveDate,
    ) -> anyhow::Result<Option<ExercisePlan>>;

    async fn get_by_id(&mut self, plan_id: Uuid) -> anyhow::Result<Option<ExercisePlan>>;

    async fn list_by_user(
        &mut self,
        user_id: Uuid,
        status: Option<PlanStatus>,
    ) -> anyhow::Result<Vec<ExercisePlan>>;

    /// Insert or update. Implementations backed by Postgres MUST translate a
    /// violation of `uq_exercise_plans_user_target_date_active` into
    /// `StoreError::UniqueViolation` (see `error.rs`) rather than a bare
    /// `anyhow::Error`, so the service can fold it into `PlanConflict`.
    async fn save(&mut self, plan: ExercisePlan) -> anyhow::Result<ExercisePlan>;
}

#[async_trait]
pub trait ExerciseSessionRepository: Send {
    async fn list_by_plan(&mut self, plan_id: Uuid) -> anyhow::Result<Vec<ExerciseSession>>;
    async fn get_by_id(&mut self, session_id: Uuid) -> anyhow::Result<Option<ExerciseSession>>;
    async fn save(&mut self, session: ExerciseSession) -> anyhow::Result<ExerciseSession>;
}

#[async_trait]
pub trait ExerciseSetStateRepository: Send {
    async fn get(
        &mut self,
        session_id: Uuid,
        set_no: i32,
    ) -> anyhow::Result<Option<ExerciseSetState>>;

    /// All set-states for a session, ordered by `set_no` ascending. Used by
    /// `submit_set_result`'s ordering check, which must inspect every prior
    /// position, not just the pending ones.
    async fn list_by_session(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>>;

    async fn list_pending(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>>;

    async fn save(&mut self, state: ExerciseSetState) -> anyhow::Result<ExerciseSetState>;
}

#[async_trait]
pub trait ReadingPlanRepository: Send {
    /// One active plan per user by lookup convention: implementations
    /// order by `created_at desc` and take the first row.
    async fn get_by_user(&mut self, user_id: Uuid) -> anyhow::Result<Option<ReadingPlan>>;
    async fn save(&mut self, plan: ReadingPlan) -> anyhow::Result<ReadingPlan>;
}

#[async_trait]
pub trait ReadingLogRepository: Send {
    async fn list(
        &mut self,
        user_id: Uuid,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ReadingLog>>;

    async fn get_by_id(&mut self, log_id: Uuid) -> anyhow::Result<Option<ReadingLog>>;
    async fn save(&mut self, log: ReadingLog) -> anyhow::Result<ReadingLog>;
}

#[async_trait]
pub trait NotificationRepository: Send {
    async fn get_by_id(&mut self, notification_id: Uuid) -> anyhow::Result<Option<Notification>>;

    async fn get_by_idempotency_key(
        &mut self,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<Notification>>;

    /// Insert or update. Implementations backed by Postgres MUST translate a
    /// violation of the `notifications.idempotency_key` uniqueness
    /// constraint into `StoreError::UniqueViolation` so a racing caller can
    /// re-lookup instead of failing.
    async fn save(&mut self, notification: Notification) -> anyhow::Result<Notification>;
}

#[async_trait]
pub trait WebhookEventRepository: Send {
    async fn get_by_provider_and_key(
        &mut self,
        provider: &str,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<WebhookEvent>>;

    async fn get_by_provider_and_event_id(
        &mut self,
        provider: &str,
        event_id: &str,
    ) -> anyhow::Result<Option<WebhookEvent>>;

    async fn insert(&mut self, event: NewWebhookEvent) -> anyhow::Result<WebhookEvent>;
}

#[async_trait]
pub trait OutboxEventRepository: Send {
    /// Append a new event inside the ambient transaction (invariant O1).
    async fn append(&mut self, event: NewOutboxEvent) -> anyhow::Result<OutboxEvent>;

    /// Earliest-created PENDING events, up to `limit`. The contract allows
    /// (does not mandate) `SELECT ... FOR UPDATE SKIP LOCKED` semantics for
    /// concurrent drainers.
    async fn lease_pending(&mut self, limit: i64) -> anyhow::Result<Vec<OutboxEvent>>;

    async fn mark_complete(&mut self, event_id: Uuid) -> anyhow::Result<Option<OutboxEvent>>;

    async fn mark_failed(
        &mut self,
        event_id: Uuid,
        reason: &str,
    ) -> anyhow::Result<Option<OutboxEvent>>;
}

#[async_trait]
pub trait SummaryRepository: Send {
    async fn get_daily(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<Option<DailySummary>>;

    async fn upsert_daily(&mut self, summary: DailySummary) -> anyhow::Result<DailySummary>;

    async fn get_weekly(
        &mut self,
        user_id: Uuid,
        start_date: NaiveDate,
    ) -> anyhow::Result<Option<WeeklySummary>>;

    async fn upsert_weekly(&mut self, summary: WeeklySummary) -> anyhow::Result<WeeklySummary>;

    /// `(total_sets, done_sets)` across every session of every plan the user
    /// owns whose `target_date == summary_date`.
    async fn aggregate_exercise_sets(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<(i64, i64)>;

    async fn has_reading_completion(
        &mut self,
        user_id: Uuid,
        window_start_utc: DateTime<Utc>,
        window_end_utc: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
}
