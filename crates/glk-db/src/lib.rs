//! Postgres-backed repository implementations (C9): manual `sqlx::query` +
//! `row.try_get` row mapping rather than the `query_as!` compile-time macro,
//! a single `connect_from_env`/`migrate` entry point, and embedded
//! migrations run with `sqlx::migrate!`.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod error;
mod exercise;
mod notification;
mod outbox;
mod reading;
mod summary;
mod uow;
mod users;
mod webhook;

pub use error::{is_unique_constraint_violation, translate};
pub use uow::{PgUnitOfWork, PgUnitOfWorkFactory};

/// Matches the env var name `glk-config::AppConfig` reads `DATABASE_URL`
/// from, so a daemon and a one-off migration binary agree on the source.
pub const ENV_DB_URL: &str = "DATABASE_URL";

/// Connect to Postgres using `DATABASE_URL`.
pub async fn connect_from_env() -> anyhow::Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")
}

/// Test helper: connect using `DATABASE_URL` and ensure migrations are applied.
pub async fn testkit_db_pool() -> anyhow::Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}
