//! In-memory repository doubles for `glk-core`'s service-level unit tests.
//! One plain `HashMap<Id, Entity>` per aggregate; `SummaryRepository`
//! derives its aggregates from the in-memory exercise/reading data rather
//! than a seed-injected shortcut, so the same service code exercised
//! against `glk-db` in production runs unchanged against this double.
//!
//! One struct, `InMemoryUnitOfWork`, implements every repository trait plus
//! `UnitOfWork` directly — the same single-struct shape `glk-db`'s
//! `PgUnitOfWork` uses, so tests exercise the real trait boundary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use glk_core::ports::{
    ExercisePlanRepository, ExerciseSessionRepository, ExerciseSetStateRepository,
    NotificationRepository, OutboxEventRepository, ReadingLogRepository, ReadingPlanRepository,
    SummaryRepository, UserProfileRepository, UserRepository, WebhookEventRepository,
};
use glk_core::uow::{UnitOfWork, UnitOfWorkFactory, UnitOfWorkFinish};
use glk_schemas::{
    DailySummary, ExercisePlan, ExerciseSession, ExerciseSetState, NewOutboxEvent,
    NewWebhookEvent, Notification, OutboxEvent, OutboxStatus, PlanStatus, ReadingLog,
    ReadingPlan, User, UserProfile, WebhookEvent, WeeklySummary,
};

/// All aggregate tables, held behind one lock so a begin/commit/rollback
/// cycle can snapshot-and-replace atomically without per-table locking.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    user_profiles: HashMap<Uuid, UserProfile>,
    exercise_plans: HashMap<Uuid, ExercisePlan>,
    exercise_sessions: HashMap<Uuid, ExerciseSession>,
    exercise_set_states: HashMap<Uuid, ExerciseSetState>,
    reading_plans: HashMap<Uuid, ReadingPlan>,
    reading_logs: HashMap<Uuid, ReadingLog>,
    notifications: HashMap<Uuid, Notification>,
    webhook_events: HashMap<Uuid, WebhookEvent>,
    outbox_events: HashMap<Uuid, OutboxEvent>,
    daily_summaries: HashMap<(Uuid, NaiveDate), DailySummary>,
    weekly_summaries: HashMap<(Uuid, NaiveDate), WeeklySummary>,
}

/// Shared backing store a `InMemoryUnitOfWorkFactory` hands out snapshots
/// of. Standalone unit tests (`InMemoryUnitOfWork::new_standalone`) skip the
/// factory and own their `Tables` outright.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One begun unit of work: a staged working copy of `Tables`, plus (when
/// begun through a factory) a handle back to the shared store to merge into
/// on commit. `commit`/`rollback` model the same snapshot-copy-then-merge
/// semantics a real `sqlx::Transaction` gives for free.
pub struct InMemoryUnitOfWork {
    staged: Tables,
    shared: Option<Arc<Mutex<Tables>>>,
}

impl InMemoryUnitOfWork {
    /// A unit of work with no backing factory, for service-level unit
    /// tests that never call `commit`/`rollback` — they exercise the
    /// service function directly against `staged` and assert on it.
    pub fn new_standalone() -> Self {
        InMemoryUnitOfWork {
            staged: Tables::default(),
            shared: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUnitOfWorkFactory {
    store: InMemoryStore,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new() -> Self {
        InMemoryUnitOfWorkFactory {
            store: InMemoryStore::new(),
        }
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    async fn begin(&self) -> anyhow::Result<Box<dyn UnitOfWorkFinish>> {
        let staged = self.store.tables.lock().expect("store lock poisoned").clone();
        Ok(Box::new(InMemoryUnitOfWork {
            staged,
            shared: Some(self.store.tables.clone()),
        }))
    }
}

#[async_trait]
impl UnitOfWorkFinish for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        if let Some(shared) = &self.shared {
            *shared.lock().expect("store lock poisoned") = self.staged;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        // The staged copy is simply dropped; `shared` was never mutated.
        Ok(())
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }
    fn user_profiles(&mut self) -> &mut dyn UserProfileRepository {
        self
    }
    fn exercise_plans(&mut self) -> &mut dyn ExercisePlanRepository {
        self
    }
    fn exercise_sessions(&mut self) -> &mut dyn ExerciseSessionRepository {
        self
    }
    fn exercise_set_states(&mut self) -> &mut dyn ExerciseSetStateRepository {
        self
    }
    fn reading_plans(&mut self) -> &mut dyn ReadingPlanRepository {
        self
    }
    fn reading_logs(&mut self) -> &mut dyn ReadingLogRepository {
        self
    }
    fn notifications(&mut self) -> &mut dyn NotificationRepository {
        self
    }
    fn webhook_events(&mut self) -> &mut dyn WebhookEventRepository {
        self
    }
    fn outbox_events(&mut self) -> &mut dyn OutboxEventRepository {
        self
    }
    fn summaries(&mut self) -> &mut dyn SummaryRepository {
        self
    }
}

#[async_trait]
impl UserRepository for InMemoryUnitOfWork {
    async fn get_by_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.staged.users.get(&user_id).cloned())
    }

    async fn get_by_external_id(&mut self, external_id: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn save(&mut self, user: User) -> anyhow::Result<User> {
        self.staged.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryUnitOfWork {
    async fn get_by_user_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        Ok(self
            .staged
            .user_profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn save(&mut self, profile: UserProfile) -> anyhow::Result<UserProfile> {
        self.staged.user_profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl ExercisePlanRepository for InMemoryUnitOfWork {
    async fn get_active_by_user_and_date(
        &mut self,
        user_id: Uuid,
        target_date: NaiveDate,
    ) -> anyhow::Result<Option<ExercisePlan>> {
        Ok(self
            .staged
            .exercise_plans
            .values()
            .find(|p| {
                p.user_id == user_id && p.target_date == target_date && p.status == PlanStatus::Active
            })
            .cloned())
    }

    async fn get_by_id(&mut self, plan_id: Uuid) -> anyhow::Result<Option<ExercisePlan>> {
        Ok(self.staged.exercise_plans.get(&plan_id).cloned())
    }

    async fn list_by_user(
        &mut self,
        user_id: Uuid,
        status: Option<PlanStatus>,
    ) -> anyhow::Result<Vec<ExercisePlan>> {
        let mut plans: Vec<ExercisePlan> = self
            .staged
            .exercise_plans
            .values()
            .filter(|p| p.user_id == user_id && status.map(|s| s == p.status).unwrap_or(true))
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.created_at);
        Ok(plans)
    }

    async fn save(&mut self, plan: ExercisePlan) -> anyhow::Result<ExercisePlan> {
        if plan.status == PlanStatus::Active {
            let clashes = self.staged.exercise_plans.values().any(|p| {
                p.id != plan.id
                    && p.user_id == plan.user_id
                    && p.target_date == plan.target_date
                    && p.status == PlanStatus::Active
            });
            if clashes {
                return Err(glk_core::StoreError::UniqueViolation {
                    constraint: "uq_exercise_plans_user_target_date_active".to_string(),
                }
                .into());
            }
        }
        self.staged.exercise_plans.insert(plan.id, plan.clone());
        Ok(plan)
    }
}

#[async_trait]
impl ExerciseSessionRepository for InMemoryUnitOfWork {
    async fn list_by_plan(&mut self, plan_id: Uuid) -> anyhow::Result<Vec<ExerciseSession>> {
        let mut sessions: Vec<ExerciseSession> = self
            .staged
            .exercise_sessions
            .values()
            .filter(|s| s.plan_id == plan_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.order_no);
        Ok(sessions)
    }

    async fn get_by_id(&mut self, session_id: Uuid) -> anyhow::Result<Option<ExerciseSession>> {
        Ok(self.staged.exercise_sessions.get(&session_id).cloned())
    }

    async fn save(&mut self, session: ExerciseSession) -> anyhow::Result<ExerciseSession> {
        self.staged.exercise_sessions.insert(session.id, session.clone());
        Ok(session)
    }
}

#[async_trait]
impl ExerciseSetStateRepository for InMemoryUnitOfWork {
    async fn get(
        &mut self,
        session_id: Uuid,
        set_no: i32,
    ) -> anyhow::Result<Option<ExerciseSetState>> {
        Ok(self
            .staged
            .exercise_set_states
            .values()
            .find(|s| s.session_id == session_id && s.set_no == set_no)
            .cloned())
    }

    async fn list_by_session(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>> {
        let mut states: Vec<ExerciseSetState> = self
            .staged
            .exercise_set_states
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        states.sort_by_key(|s| s.set_no);
        Ok(states)
    }

    async fn list_pending(&mut self, session_id: Uuid) -> anyhow::Result<Vec<ExerciseSetState>> {
        let mut states: Vec<ExerciseSetState> = self
            .staged
            .exercise_set_states
            .values()
            .filter(|s| s.session_id == session_id && s.status == glk_schemas::SetStatus::Pending)
            .cloned()
            .collect();
        states.sort_by_key(|s| s.set_no);
        Ok(states)
    }

    async fn save(&mut self, state: ExerciseSetState) -> anyhow::Result<ExerciseSetState> {
        self.staged.exercise_set_states.insert(state.id, state.clone());
        Ok(state)
    }
}

#[async_trait]
impl ReadingPlanRepository for InMemoryUnitOfWork {
    async fn get_by_user(&mut self, user_id: Uuid) -> anyhow::Result<Option<ReadingPlan>> {
        Ok(self
            .staged
            .reading_plans
            .values()
            .filter(|p| p.user_id == user_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn save(&mut self, plan: ReadingPlan) -> anyhow::Result<ReadingPlan> {
        self.staged.reading_plans.insert(plan.id, plan.clone());
        Ok(plan)
    }
}

#[async_trait]
impl ReadingLogRepository for InMemoryUnitOfWork {
    async fn list(
        &mut self,
        user_id: Uuid,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ReadingLog>> {
        let mut logs: Vec<ReadingLog> = self
            .staged
            .reading_logs
            .values()
            .filter(|l| {
                l.user_id == user_id
                    && from_date.map(|d| l.created_at.date_naive() >= d).unwrap_or(true)
                    && to_date.map(|d| l.created_at.date_naive() <= d).unwrap_or(true)
            })
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.created_at);
        Ok(logs)
    }

    async fn get_by_id(&mut self, log_id: Uuid) -> anyhow::Result<Option<ReadingLog>> {
        Ok(self.staged.reading_logs.get(&log_id).cloned())
    }

    async fn save(&mut self, log: ReadingLog) -> anyhow::Result<ReadingLog> {
        self.staged.reading_logs.insert(log.id, log.clone());
        Ok(log)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryUnitOfWork {
    async fn get_by_id(&mut self, notification_id: Uuid) -> anyhow::Result<Option<Notification>> {
        Ok(self.staged.notifications.get(&notification_id).cloned())
    }

    async fn get_by_idempotency_key(
        &mut self,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<Notification>> {
        Ok(self
            .staged
            .notifications
            .values()
            .find(|n| n.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn save(&mut self, notification: Notification) -> anyhow::Result<Notification> {
        let clashes = self.staged.notifications.values().any(|n| {
            n.id != notification.id && n.idempotency_key == notification.idempotency_key
        });
        if clashes {
            return Err(glk_core::StoreError::UniqueViolation {
                constraint: "notifications_idempotency_key_key".to_string(),
            }
            .into());
        }
        self.staged.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryUnitOfWork {
    async fn get_by_provider_and_key(
        &mut self,
        provider: &str,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<WebhookEvent>> {
        Ok(self
            .staged
            .webhook_events
            .values()
            .find(|e| e.provider == provider && e.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn get_by_provider_and_event_id(
        &mut self,
        provider: &str,
        event_id: &str,
    ) -> anyhow::Result<Option<WebhookEvent>> {
        Ok(self
            .staged
            .webhook_events
            .values()
            .find(|e| e.provider == provider && e.event_id.as_deref() == Some(event_id))
            .cloned())
    }

    async fn insert(&mut self, event: NewWebhookEvent) -> anyhow::Result<WebhookEvent> {
        let clashes = self.staged.webhook_events.values().any(|e| {
            (e.provider == event.provider && e.idempotency_key == event.idempotency_key)
                || (event.event_id.is_some()
                    && e.provider == event.provider
                    && e.event_id == event.event_id)
        });
        if clashes {
            return Err(glk_core::StoreError::UniqueViolation {
                constraint: "uq_webhook_events_provider_idempotency".to_string(),
            }
            .into());
        }

        let row = WebhookEvent {
            id: Uuid::new_v4(),
            provider: event.provider,
            event_type: event.event_type,
            user_id: event.user_id,
            idempotency_key: event.idempotency_key,
            event_id: event.event_id,
            raw_payload: event.raw_payload,
            processed: false,
            retry_count: 0,
            reason_code: event.reason_code,
            signature_state: event.signature_state,
            created_at: Utc::now(),
        };
        self.staged.webhook_events.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl OutboxEventRepository for InMemoryUnitOfWork {
    async fn append(&mut self, event: NewOutboxEvent) -> anyhow::Result<OutboxEvent> {
        let now = Utc::now();
        let row = OutboxEvent {
            id: Uuid::new_v4(),
            aggregate_type: event.aggregate_type.to_string(),
            aggregate_id: event.aggregate_id,
            event_type: event.event_type.to_string(),
            payload: event.payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.staged.outbox_events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn lease_pending(&mut self, limit: i64) -> anyhow::Result<Vec<OutboxEvent>> {
        let mut events: Vec<OutboxEvent> = self
            .staged
            .outbox_events
            .values()
            .filter(|e| e.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn mark_complete(&mut self, event_id: Uuid) -> anyhow::Result<Option<OutboxEvent>> {
        let Some(event) = self.staged.outbox_events.get_mut(&event_id) else {
            return Ok(None);
        };
        event.status = OutboxStatus::Completed;
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn mark_failed(
        &mut self,
        event_id: Uuid,
        reason: &str,
    ) -> anyhow::Result<Option<OutboxEvent>> {
        let Some(event) = self.staged.outbox_events.get_mut(&event_id) else {
            return Ok(None);
        };
        event.status = OutboxStatus::Failed;
        event.retry_count += 1;
        event.updated_at = Utc::now();
        if let Some(obj) = event.payload.as_object_mut() {
            obj.insert("failure_reason".to_string(), serde_json::Value::String(reason.to_string()));
        } else {
            event.payload = serde_json::json!({ "failure_reason": reason });
        }
        Ok(Some(event.clone()))
    }
}

#[async_trait]
impl SummaryRepository for InMemoryUnitOfWork {
    async fn get_daily(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<Option<DailySummary>> {
        Ok(self.staged.daily_summaries.get(&(user_id, summary_date)).cloned())
    }

    async fn upsert_daily(&mut self, summary: DailySummary) -> anyhow::Result<DailySummary> {
        let key = (summary.user_id, summary.summary_date);
        let mut row = summary;
        if let Some(existing) = self.staged.daily_summaries.get(&key) {
            row.id = existing.id;
        }
        self.staged.daily_summaries.insert(key, row.clone());
        Ok(row)
    }

    async fn get_weekly(
        &mut self,
        user_id: Uuid,
        start_date: NaiveDate,
    ) -> anyhow::Result<Option<WeeklySummary>> {
        Ok(self.staged.weekly_summaries.get(&(user_id, start_date)).cloned())
    }

    async fn upsert_weekly(&mut self, summary: WeeklySummary) -> anyhow::Result<WeeklySummary> {
        let key = (summary.user_id, summary.start_date);
        let mut row = summary;
        if let Some(existing) = self.staged.weekly_summaries.get(&key) {
            row.id = existing.id;
        }
        self.staged.weekly_summaries.insert(key, row.clone());
        Ok(row)
    }

    /// `(total_sets, done_sets)` derived from the actual in-memory set-state
    /// rows for every session of every plan the user owns whose
    /// `target_date == summary_date` — not a seed shortcut, so service logic
    /// exercised here matches what `glk-db`'s SQL aggregation computes.
    async fn aggregate_exercise_sets(
        &mut self,
        user_id: Uuid,
        summary_date: NaiveDate,
    ) -> anyhow::Result<(i64, i64)> {
        let plan_ids: Vec<Uuid> = self
            .staged
            .exercise_plans
            .values()
            .filter(|p| p.user_id == user_id && p.target_date == summary_date)
            .map(|p| p.id)
            .collect();

        let session_ids: Vec<Uuid> = self
            .staged
            .exercise_sessions
            .values()
            .filter(|s| plan_ids.contains(&s.plan_id))
            .map(|s| s.id)
            .collect();

        let mut total = 0i64;
        let mut done = 0i64;
        for state in self.staged.exercise_set_states.values() {
            if session_ids.contains(&state.session_id) {
                total += 1;
                if state.status == glk_schemas::SetStatus::Done {
                    done += 1;
                }
            }
        }
        Ok((total, done))
    }

    async fn has_reading_completion(
        &mut self,
        user_id: Uuid,
        window_start_utc: DateTime<Utc>,
        window_end_utc: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(self.staged.reading_logs.values().any(|log| {
            log.user_id == user_id
                && log.status.counts_as_settled()
                && log.created_at >= window_start_utc
                && log.created_at <= window_end_utc
        }))
    }
}
