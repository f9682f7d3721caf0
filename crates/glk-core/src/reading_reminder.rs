//! Reading-reminder service (C6): `schedule_daily_reminder` and
//! `schedule_retry_if_incomplete`. The idempotency lookup always runs
//! *before* the policy gates (disabled-reminder, already-completed) so a
//! duplicate request never re-evaluates a gate it already passed.

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use glk_schemas::{NotificationKind, NotificationPayload, ReadingLogStatus, DEFAULT_TIMEZONE};
use uuid::Uuid;

use crate::error::CoreError;
use crate::notification;
use crate::uow::UnitOfWork;

const RETRY_DELAY_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderResult {
    Created,
    Duplicate,
    SkippedDisabled,
    SkippedCompleted,
}

#[derive(Debug, Clone)]
pub struct ReminderOutcome {
    pub result: ReminderResult,
    pub notification_id: Option<Uuid>,
    pub schedule_at: Option<chrono::DateTime<Utc>>,
}

pub fn daily_idempotency_key(user_id: Uuid, reference_date: NaiveDate) -> String {
    format!("reading:reminder:{user_id}:{reference_date}")
}

pub fn retry_idempotency_key(user_id: Uuid, reference_date: NaiveDate) -> String {
    format!("reading:reminder:retry:{user_id}:{reference_date}")
}

/// Resolve the user's IANA timezone, falling back to `Asia/Seoul` when
/// absent or unresolvable (DESIGN.md OQ-1 — the same fallback convention
/// the summary aggregator uses for `recompute_daily`).
fn resolve_timezone(raw: &str) -> Tz {
    if raw.trim().is_empty() {
        return DEFAULT_TIMEZONE.parse().expect("default timezone is valid");
    }
    raw.parse::<Tz>()
        .unwrap_or_else(|_| DEFAULT_TIMEZONE.parse().expect("default timezone is valid"))
}

pub async fn schedule_daily_reminder(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    reference_date: NaiveDate,
    idempotency_key: Option<String>,
) -> Result<ReminderOutcome, CoreError> {
    let key = idempotency_key.unwrap_or_else(|| daily_idempotency_key(user_id, reference_date));

    if let Some(existing) = lookup(uow, &key).await? {
        scope_validate_daily(&existing, user_id, reference_date)?;
        return Ok(ReminderOutcome {
            result: ReminderResult::Duplicate,
            notification_id: Some(existing.id),
            schedule_at: Some(existing.schedule_at),
        });
    }

    let plan = uow
        .reading_plans()
        .get_by_user(user_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| CoreError::ReadingPlanNotFound(format!("no reading plan for {user_id}")))?;

    if !plan.enabled {
        return Ok(ReminderOutcome {
            result: ReminderResult::SkippedDisabled,
            notification_id: None,
            schedule_at: None,
        });
    }

    let tz = resolve_timezone(&uow_user_timezone(uow, user_id).await?);
    let schedule_at = local_wall_clock_to_utc(reference_date, plan.remind_time, tz);

    let payload = NotificationPayload::ReadingReminder {
        reading_plan_id: plan.id,
        reference_date,
    };

    let created = notification::create_pending_notification(
        uow,
        user_id,
        NotificationKind::ReadingReminder,
        Some(plan.id),
        schedule_at,
        Some(key),
        Some(payload.into_value()),
    )
    .await
    .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    Ok(ReminderOutcome {
        result: ReminderResult::Created,
        notification_id: Some(created.id),
        schedule_at: Some(created.schedule_at),
    })
}

pub async fn schedule_retry_if_incomplete(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    reference_date: NaiveDate,
    base_notification_id: Uuid,
    idempotency_key: Option<String>,
) -> Result<ReminderOutcome, CoreError> {
    let key = idempotency_key.unwrap_or_else(|| retry_idempotency_key(user_id, reference_date));

    if let Some(existing) = lookup(uow, &key).await? {
        scope_validate_retry(&existing, user_id, reference_date, base_notification_id)?;
        return Ok(ReminderOutcome {
            result: ReminderResult::Duplicate,
            notification_id: Some(existing.id),
            schedule_at: Some(existing.schedule_at),
        });
    }

    let plan = uow
        .reading_plans()
        .get_by_user(user_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| CoreError::ReadingPlanNotFound(format!("no reading plan for {user_id}")))?;

    if !plan.enabled {
        return Ok(ReminderOutcome {
            result: ReminderResult::SkippedDisabled,
            notification_id: None,
            schedule_at: None,
        });
    }

    let logs = uow
        .reading_logs()
        .list(user_id, Some(reference_date), Some(reference_date))
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;
    if logs.iter().any(|l| l.status.counts_as_settled()) {
        return Ok(ReminderOutcome {
            result: ReminderResult::SkippedCompleted,
            notification_id: None,
            schedule_at: None,
        });
    }

    let base = uow
        .notifications()
        .get_by_id(base_notification_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| CoreError::Validation("base notification not found".into()))?;

    if base.user_id != user_id {
        return Err(CoreError::Validation(
            "base notification does not belong to user".into(),
        ));
    }
    if base.kind != NotificationKind::ReadingReminder.as_str() {
        return Err(CoreError::Validation(
            "base notification is not a READING_REMINDER".into(),
        ));
    }
    // `base.schedule_at` is the UTC instant `local_wall_clock_to_utc` produced
    // from `remind_time` in the user's timezone (OQ-1); compare the date in
    // that same timezone, not the raw UTC date, or an east-of-UTC zone (the
    // `Asia/Seoul` default included) rolls a morning reminder onto the prior
    // UTC day and fails this check for a perfectly valid retry.
    let tz = resolve_timezone(&uow_user_timezone(uow, user_id).await?);
    if base.schedule_at.with_timezone(&tz).date_naive() != reference_date {
        return Err(CoreError::Validation(
            "base notification's schedule_at does not match reference_date".into(),
        ));
    }

    let schedule_at = base.schedule_at + Duration::minutes(RETRY_DELAY_MINUTES);

    let payload = NotificationPayload::ReadingReminderRetry {
        reading_plan_id: plan.id,
        reference_date,
        base_notification_id,
    };

    let created = notification::create_pending_notification(
        uow,
        user_id,
        NotificationKind::ReadingReminderRetry,
        Some(plan.id),
        schedule_at,
        Some(key),
        Some(payload.into_value()),
    )
    .await
    .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    Ok(ReminderOutcome {
        result: ReminderResult::Created,
        notification_id: Some(created.id),
        schedule_at: Some(created.schedule_at),
    })
}

async fn lookup(
    uow: &mut dyn UnitOfWork,
    key: &str,
) -> Result<Option<glk_schemas::Notification>, CoreError> {
    uow.notifications()
        .get_by_idempotency_key(key)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))
}

fn scope_validate_daily(
    existing: &glk_schemas::Notification,
    user_id: Uuid,
    reference_date: NaiveDate,
) -> Result<(), CoreError> {
    let payload_date = existing
        .payload
        .get("reference_date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<NaiveDate>().ok());

    if existing.user_id != user_id
        || existing.kind != NotificationKind::ReadingReminder.as_str()
        || payload_date != Some(reference_date)
    {
        return Err(CoreError::Validation(
            "idempotency key reused by another scope".into(),
        ));
    }
    Ok(())
}

fn scope_validate_retry(
    existing: &glk_schemas::Notification,
    user_id: Uuid,
    reference_date: NaiveDate,
    base_notification_id: Uuid,
) -> Result<(), CoreError> {
    let payload_date = existing
        .payload
        .get("reference_date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<NaiveDate>().ok());
    let payload_base = existing
        .payload
        .get("base_notification_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Uuid>().ok());

    if existing.user_id != user_id
        || existing.kind != NotificationKind::ReadingReminderRetry.as_str()
        || payload_date != Some(reference_date)
        || payload_base != Some(base_notification_id)
    {
        return Err(CoreError::Validation(
            "idempotency key reused by another scope".into(),
        ));
    }
    Ok(())
}

fn local_wall_clock_to_utc(
    reference_date: NaiveDate,
    remind_time: chrono::NaiveTime,
    tz: Tz,
) -> chrono::DateTime<Utc> {
    let naive: NaiveDateTime = reference_date.and_time(remind_time);
    tz.from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .with_timezone(&Utc)
}

async fn uow_user_timezone(uow: &mut dyn UnitOfWork, user_id: Uuid) -> Result<String, CoreError> {
    let user = uow
        .users()
        .get_by_id(user_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;
    Ok(user.map(|u| u.timezone).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glk_schemas::{ReadingLog, ReadingPlan, User, UserStatus};
    use glk_testkit::InMemoryUnitOfWork;

    async fn make_user(uow: &mut InMemoryUnitOfWork, timezone: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        uow.users()
            .save(User {
                id,
                external_id: id.to_string(),
                display_name: "tester".into(),
                timezone: timezone.to_string(),
                status: UserStatus::Active,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        id
    }

    async fn make_reading_plan(uow: &mut InMemoryUnitOfWork, user_id: Uuid, enabled: bool) {
        make_reading_plan_at(uow, user_id, enabled, chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap()).await
    }

    async fn make_reading_plan_at(
        uow: &mut InMemoryUnitOfWork,
        user_id: Uuid,
        enabled: bool,
        remind_time: chrono::NaiveTime,
    ) {
        let now = Utc::now();
        uow.reading_plans()
            .save(ReadingPlan {
                id: Uuid::new_v4(),
                user_id,
                remind_time,
                goal_minutes: 30,
                enabled,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_reply_returns_same_id_with_no_new_outbox_event() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "Asia/Seoul").await;
        make_reading_plan(&mut uow, user_id, true).await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();

        let first = schedule_daily_reminder(&mut uow, user_id, reference_date, None)
            .await
            .unwrap();
        assert_eq!(first.result, ReminderResult::Created);

        let before = uow.outbox_events().lease_pending(100).await.unwrap().len();
        let second = schedule_daily_reminder(&mut uow, user_id, reference_date, None)
            .await
            .unwrap();
        let after = uow.outbox_events().lease_pending(100).await.unwrap().len();

        assert_eq!(second.result, ReminderResult::Duplicate);
        assert_eq!(second.notification_id, first.notification_id);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn same_key_different_scope_fails_validation_even_when_disabled() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let u2 = make_user(&mut uow, "Asia/Seoul").await;
        make_reading_plan(&mut uow, u2, true).await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();

        schedule_daily_reminder(&mut uow, u2, reference_date, Some("K".into()))
            .await
            .unwrap();

        let u3 = make_user(&mut uow, "Asia/Seoul").await;
        make_reading_plan(&mut uow, u3, false).await;

        let err = schedule_daily_reminder(&mut uow, u3, reference_date, Some("K".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn retry_skipped_when_already_completed() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "UTC").await;
        make_reading_plan(&mut uow, user_id, true).await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();

        let base = schedule_daily_reminder(&mut uow, user_id, reference_date, None)
            .await
            .unwrap();

        let now = Utc::now();
        uow.reading_logs()
            .save(ReadingLog {
                id: Uuid::new_v4(),
                user_id,
                reading_plan_id: None,
                book_title: None,
                status: ReadingLogStatus::Done,
                pages_read: Some(10),
                created_at: reference_date.and_hms_opt(10, 0, 0).unwrap().and_utc(),
            })
            .await
            .unwrap();
        let _ = now;

        let retry = schedule_retry_if_incomplete(
            &mut uow,
            user_id,
            reference_date,
            base.notification_id.unwrap(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(retry.result, ReminderResult::SkippedCompleted);
    }

    #[tokio::test]
    async fn retry_schedule_at_is_base_plus_30_minutes() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "UTC").await;
        make_reading_plan(&mut uow, user_id, true).await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();

        let base = schedule_daily_reminder(&mut uow, user_id, reference_date, None)
            .await
            .unwrap();

        let retry = schedule_retry_if_incomplete(
            &mut uow,
            user_id,
            reference_date,
            base.notification_id.unwrap(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(
            retry.schedule_at.unwrap(),
            base.schedule_at.unwrap() + Duration::minutes(30)
        );
    }

    /// `Asia/Seoul` (UTC+9) with a morning `remind_time` pushes the stored
    /// UTC instant onto the *previous* calendar day (07:00 KST on the 22nd
    /// is 22:00 UTC on the 21st). The retry's scope check must still
    /// succeed by comparing in the user's timezone, not the raw UTC date.
    #[tokio::test]
    async fn retry_succeeds_for_seoul_user_with_morning_reminder_crossing_utc_midnight() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "Asia/Seoul").await;
        make_reading_plan_at(
            &mut uow,
            user_id,
            true,
            chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        )
        .await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();

        let base = schedule_daily_reminder(&mut uow, user_id, reference_date, None)
            .await
            .unwrap();
        assert_eq!(base.result, ReminderResult::Created);
        // Sanity: the stored UTC instant really did roll onto the prior day.
        assert_eq!(
            base.schedule_at.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 21).unwrap()
        );

        let retry = schedule_retry_if_incomplete(
            &mut uow,
            user_id,
            reference_date,
            base.notification_id.unwrap(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(retry.result, ReminderResult::Created);
        assert_eq!(
            retry.schedule_at.unwrap(),
            base.schedule_at.unwrap() + Duration::minutes(30)
        );
    }
}
