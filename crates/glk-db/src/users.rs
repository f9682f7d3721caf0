use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use glk_core::ports::{UserProfileRepository, UserRepository};
use glk_schemas::{User, UserProfile, UserStatus};

use crate::uow::PgUnitOfWork;

fn row_to_user(row: &sqlx::postgres::PgRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        display_name: row.try_get("display_name")?,
        timezone: row.try_get("timezone")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<UserStatus>()
            .map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgUnitOfWork {
    async fn get_by_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("select * from users where id = $1")
            .bind(user_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_external_id(&mut self, external_id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("select * from users where external_id = $1")
            .bind(external_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn save(&mut self, user: User) -> anyhow::Result<User> {
        let row = sqlx::query(
            r#"
            insert into users (id, external_id, display_name, timezone, status, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (id) do update set
                external_id = excluded.external_id,
                display_name = excluded.display_name,
                timezone = excluded.timezone,
                status = excluded.status,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(user.id)
        .bind(&user.external_id)
        .bind(&user.display_name)
        .bind(&user.timezone)
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_user(&row)
    }
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> anyhow::Result<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        age: row.try_get("age")?,
        height_cm: row.try_get("height_cm")?,
        weight_kg: row.try_get("weight_kg")?,
        goal: row.try_get("goal")?,
        experience_level: row.try_get("experience_level")?,
        max_daily_minutes: row.try_get("max_daily_minutes")?,
        available_equipment: row.try_get("available_equipment")?,
        injury_notes: row.try_get("injury_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserProfileRepository for PgUnitOfWork {
    async fn get_by_user_id(&mut self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("select * from user_profiles where user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **self.tx())
            .await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    async fn save(&mut self, profile: UserProfile) -> anyhow::Result<UserProfile> {
        let row = sqlx::query(
            r#"
            insert into user_profiles (
                id, user_id, age, height_cm, weight_kg, goal, experience_level,
                max_daily_minutes, available_equipment, injury_notes, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            on conflict (user_id) do update set
                age = excluded.age,
                height_cm = excluded.height_cm,
                weight_kg = excluded.weight_kg,
                goal = excluded.goal,
                experience_level = excluded.experience_level,
                max_daily_minutes = excluded.max_daily_minutes,
                available_equipment = excluded.available_equipment,
                injury_notes = excluded.injury_notes,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(profile.age)
        .bind(profile.height_cm)
        .bind(profile.weight_kg)
        .bind(&profile.goal)
        .bind(&profile.experience_level)
        .bind(profile.max_daily_minutes)
        .bind(&profile.available_equipment)
        .bind(&profile.injury_notes)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .fetch_one(&mut **self.tx())
        .await?;
        row_to_profile(&row)
    }
}
