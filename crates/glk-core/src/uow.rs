//! Unit-of-work (C9). Scopes a single atomic commit around each inbound
//! operation's effects on the exercise-plan, notification, reading-reminder,
//! and webhook services. Services accept `&mut dyn UnitOfWork` already
//! begun by the transport shell; they never call `commit`/`rollback`
//! themselves — only the adapter layer that opened the unit of work does,
//! after the service call returns.

use async_trait::async_trait;

use crate::ports::{
    ExercisePlanRepository, ExerciseSessionRepository, ExerciseSetStateRepository,
    NotificationRepository, OutboxEventRepository, ReadingLogRepository, ReadingPlanRepository,
    SummaryRepository, UserProfileRepository, UserRepository, WebhookEventRepository,
};

/// One aggregate-wide handle into the ambient transaction. Every accessor
/// returns `&mut dyn Trait` so callers keep programming against the narrow
/// repository contracts in `ports.rs`, never against a concrete backend.
pub trait UnitOfWork: Send {
    fn users(&mut self) -> &mut dyn UserRepository;
    fn user_profiles(&mut self) -> &mut dyn UserProfileRepository;
    fn exercise_plans(&mut self) -> &mut dyn ExercisePlanRepository;
    fn exercise_sessions(&mut self) -> &mut dyn ExerciseSessionRepository;
    fn exercise_set_states(&mut self) -> &mut dyn ExerciseSetStateRepository;
    fn reading_plans(&mut self) -> &mut dyn ReadingPlanRepository;
    fn reading_logs(&mut self) -> &mut dyn ReadingLogRepository;
    fn notifications(&mut self) -> &mut dyn NotificationRepository;
    fn webhook_events(&mut self) -> &mut dyn WebhookEventRepository;
    fn outbox_events(&mut self) -> &mut dyn OutboxEventRepository;
    fn summaries(&mut self) -> &mut dyn SummaryRepository;
}

/// Commit/rollback live on a separate trait (rather than as `UnitOfWork`
/// methods) because they consume the box — a unit of work is used exactly
/// once, then finalized one way or the other.
#[async_trait]
pub trait UnitOfWorkFinish: UnitOfWork {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

/// Factory boundary the transport shell depends on (REDESIGN FLAGS:
/// "Singleton engine/session_factory -> pass a unit-of-work factory through
/// composition; do not rely on process-global mutable state").
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn UnitOfWorkFinish>>;
}

/// Runs `f` inside a freshly begun unit of work, committing on `Ok` and
/// rolling back on `Err`. This is the one place outside the repositories
/// themselves that touches `commit`/`rollback` — every HTTP handler in
/// `glk-daemon` goes through this instead of managing the lifecycle inline.
///
/// `f` returns a boxed future rather than a bare `impl Future` so it can
/// borrow the `&mut dyn UnitOfWork` argument it's handed: callers write
/// `|uow| Box::pin(async move { ... })`.
pub async fn run_in_transaction<T, F>(factory: &dyn UnitOfWorkFactory, f: F) -> anyhow::Result<T>
where
    F: for<'a> FnOnce(
        &'a mut dyn UnitOfWork,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<T>> + Send + 'a>>,
    T: Send,
{
    let mut uow = factory.begin().await?;
    match f(uow.as_mut()).await {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            // Best-effort: a failed rollback is logged by the caller via the
            // returned error chain, not swallowed, but it never masks the
            // original service error.
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed after service error");
            }
            Err(err)
        }
    }
}
