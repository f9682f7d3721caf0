use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use glk_core::ports::{ExercisePlanRepository, UserRepository};
use glk_core::uow::run_in_transaction;
use glk_schemas::{ExercisePlan, PlanSource, PlanStatus, User, UserStatus};

fn connected_db_url() -> Option<String> {
    match std::env::var(glk_db::ENV_DB_URL) {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("SKIP: {} not set", glk_db::ENV_DB_URL);
            None
        }
    }
}

#[tokio::test]
async fn user_save_then_get_round_trips() -> anyhow::Result<()> {
    let Some(url) = connected_db_url() else {
        return Ok(());
    };

    let pool = glk_db::connect(&url).await?;
    glk_db::migrate(&pool).await?;
    let factory = glk_db::PgUnitOfWorkFactory::new(pool);

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let saved = run_in_transaction(&factory, |uow| {
        Box::pin(async move {
            Ok(uow
                .users()
                .save(User {
                    id: user_id,
                    external_id: format!("ext-{user_id}"),
                    display_name: "Roundtrip Tester".to_string(),
                    timezone: "Asia/Seoul".to_string(),
                    status: UserStatus::Active,
                    created_at: now,
                    updated_at: now,
                })
                .await?)
        })
    })
    .await?;
    assert_eq!(saved.id, user_id);

    let fetched = run_in_transaction(&factory, |uow| {
        Box::pin(async move { Ok(uow.users().get_by_id(user_id).await?) })
    })
    .await?;

    assert_eq!(fetched.map(|u| u.id), Some(user_id));
    Ok(())
}

#[tokio::test]
async fn second_active_plan_for_same_day_is_rejected_by_the_database() -> anyhow::Result<()> {
    let Some(url) = connected_db_url() else {
        return Ok(());
    };

    let pool = glk_db::connect(&url).await?;
    glk_db::migrate(&pool).await?;
    let factory = glk_db::PgUnitOfWorkFactory::new(pool);

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    run_in_transaction(&factory, |uow| {
        Box::pin(async move {
            Ok(uow
                .users()
                .save(User {
                    id: user_id,
                    external_id: format!("ext-{user_id}"),
                    display_name: "Conflict Tester".to_string(),
                    timezone: "Asia/Seoul".to_string(),
                    status: UserStatus::Active,
                    created_at: now,
                    updated_at: now,
                })
                .await?)
        })
    })
    .await?;

    let target_date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    let make_plan = |id: Uuid| ExercisePlan {
        id,
        user_id,
        target_date,
        source: PlanSource::Rule,
        status: PlanStatus::Active,
        created_at: now,
        updated_at: now,
    };

    run_in_transaction(&factory, |uow| {
        let plan = make_plan(Uuid::new_v4());
        Box::pin(async move { Ok(uow.exercise_plans().save(plan).await?) })
    })
    .await?;

    let second = run_in_transaction(&factory, |uow| {
        let plan = make_plan(Uuid::new_v4());
        Box::pin(async move { Ok(uow.exercise_plans().save(plan).await?) })
    })
    .await;

    assert!(second.is_err(), "expected a second active plan for the same day to fail");
    Ok(())
}
