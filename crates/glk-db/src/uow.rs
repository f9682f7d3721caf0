//! `sqlx`-backed unit of work (C9). One `PgUnitOfWork` per inbound
//! operation, wrapping exactly one `sqlx::Transaction<'static, Postgres>` —
//! `Pool::begin` hands back a transaction that owns its pooled connection,
//! so it needs no borrow on the pool itself and can live in this struct
//! without a lifetime parameter.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use glk_core::ports::{
    ExercisePlanRepository, ExerciseSessionRepository, ExerciseSetStateRepository,
    NotificationRepository, OutboxEventRepository, ReadingLogRepository, ReadingPlanRepository,
    SummaryRepository, UserProfileRepository, UserRepository, WebhookEventRepository,
};
use glk_core::uow::{UnitOfWork, UnitOfWorkFactory, UnitOfWorkFinish};

pub struct PgUnitOfWork {
    pub(crate) tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    /// Every repository impl in this crate reaches the ambient transaction
    /// through this accessor rather than holding its own handle.
    pub(crate) fn tx(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("unit of work used after commit/rollback")
    }
}

pub struct PgUnitOfWorkFactory {
    pool: PgPool,
}

impl PgUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        PgUnitOfWorkFactory { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> anyhow::Result<Box<dyn UnitOfWorkFinish>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow::Error::new(e).context("begin transaction failed"))?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

#[async_trait]
impl UnitOfWorkFinish for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let mut this = *self;
        let tx = this.tx.take().expect("unit of work used after commit/rollback");
        tx.commit().await.map_err(|e| anyhow::Error::new(e).context("commit failed"))
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        let mut this = *self;
        let tx = this.tx.take().expect("unit of work used after commit/rollback");
        tx.rollback().await.map_err(|e| anyhow::Error::new(e).context("rollback failed"))
    }
}

impl UnitOfWork for PgUnitOfWork {
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
