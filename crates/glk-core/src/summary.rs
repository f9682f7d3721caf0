//! Summary aggregator (C8): `recompute_daily` and `recompute_weekly`.
//! Timezone-aware completion rate, streak walk, and trend comparison
//! against the prior period.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use glk_schemas::{DailySummary, Trend, WeeklySummary, DEFAULT_TIMEZONE};
use uuid::Uuid;

use crate::error::CoreError;
use crate::uow::UnitOfWork;

const WEEK_DAYS: i64 = 7;
const MAX_STREAK_LOOKBACK_DAYS: i64 = 365;

pub async fn recompute_daily(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    summary_date: NaiveDate,
) -> Result<DailySummary, CoreError> {
    let tz = resolve_timezone(uow, user_id).await?;

    let (total_sets, done_sets) = completion_counts(uow, user_id, summary_date).await?;
    let completion_rate = rate(total_sets, done_sets);
    let reading_completed = has_reading_completion_on_local_date(uow, user_id, summary_date, tz).await?;

    let previous_rate = {
        let prev_date = summary_date - chrono::Duration::days(1);
        let (pt, pd) = completion_counts(uow, user_id, prev_date).await?;
        rate(pt, pd)
    };

    let streak_days = streak_days(uow, user_id, summary_date, tz).await?;

    let summary = DailySummary {
        id: Uuid::new_v4(),
        user_id,
        summary_date,
        total_sets,
        done_sets,
        completion_rate,
        reading_completed,
        streak_days,
        trend: trend(completion_rate, previous_rate),
        computed_at: Utc::now(),
    };

    uow.summaries()
        .upsert_daily(summary)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))
}

pub async fn recompute_weekly(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    start_date: NaiveDate,
) -> Result<WeeklySummary, CoreError> {
    let end_date = start_date + chrono::Duration::days(WEEK_DAYS - 1);

    let mut rates = Vec::with_capacity(WEEK_DAYS as usize);
    let mut last_daily = None;
    for offset in 0..WEEK_DAYS {
        let target_date = start_date + chrono::Duration::days(offset);
        let daily = recompute_daily(uow, user_id, target_date).await?;
        rates.push(daily.completion_rate);
        last_daily = Some(daily);
    }

    let week_avg = average(&rates);
    let previous_week_avg = weekly_average_for_previous_window(uow, user_id, start_date).await?;

    let streak_days = last_daily.map(|d| d.streak_days).unwrap_or(0);

    let weekly = WeeklySummary {
        id: Uuid::new_v4(),
        user_id,
        start_date,
        end_date,
        week_avg_completion_rate: week_avg,
        streak_days,
        trend: trend(week_avg, previous_week_avg),
        computed_at: Utc::now(),
    };

    uow.summaries()
        .upsert_weekly(weekly)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))
}

async fn resolve_timezone(uow: &mut dyn UnitOfWork, user_id: Uuid) -> Result<Tz, CoreError> {
    let raw = uow
        .users()
        .get_by_id(user_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .map(|u| u.timezone)
        .unwrap_or_default();

    if raw.trim().is_empty() {
        return Ok(DEFAULT_TIMEZONE.parse().expect("default timezone is valid"));
    }
    Ok(raw
        .parse::<Tz>()
        .unwrap_or_else(|_| DEFAULT_TIMEZONE.parse().expect("default timezone is valid")))
}

async fn completion_counts(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    summary_date: NaiveDate,
) -> Result<(i32, i32), CoreError> {
    let (total, done) = uow
        .summaries()
        .aggregate_exercise_sets(user_id, summary_date)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;
    Ok(normalize_set_counts(total, done))
}

fn normalize_set_counts(total_sets: i64, done_sets: i64) -> (i32, i32) {
    let normalized_total = total_sets.max(0);
    let normalized_done = done_sets.max(0).min(normalized_total);
    (normalized_total as i32, normalized_done as i32)
}

fn rate(total_sets: i32, done_sets: i32) -> f64 {
    if total_sets <= 0 {
        return 0.0;
    }
    round4(done_sets as f64 / total_sets as f64)
}

async fn has_reading_completion_on_local_date(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    target_date: NaiveDate,
    tz: Tz,
) -> Result<bool, CoreError> {
    let (window_start_utc, window_end_utc) = local_day_bounds_utc(target_date, tz);
    uow.summaries()
        .has_reading_completion(user_id, window_start_utc, window_end_utc)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))
}

fn local_day_bounds_utc(target_date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = target_date.and_time(NaiveTime::MIN);
    let end_naive = target_date.and_hms_micro_opt(23, 59, 59, 999_999).expect("valid end-of-day time");

    let start = tz
        .from_local_datetime(&start_naive)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&start_naive));
    let end = tz
        .from_local_datetime(&end_naive)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&end_naive));

    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}

async fn streak_days(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    basis_date: NaiveDate,
    tz: Tz,
) -> Result<i32, CoreError> {
    let mut streak = 0;
    let mut cursor = basis_date;
    for _ in 0..MAX_STREAK_LOOKBACK_DAYS {
        let (_, done_sets) = completion_counts(uow, user_id, cursor).await?;
        let reading_completed = has_reading_completion_on_local_date(uow, user_id, cursor, tz).await?;

        if done_sets <= 0 && !reading_completed {
            break;
        }
        streak += 1;
        cursor -= chrono::Duration::days(1);
    }
    Ok(streak)
}

async fn weekly_average_for_previous_window(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    start_date: NaiveDate,
) -> Result<f64, CoreError> {
    let previous_start = start_date - chrono::Duration::days(WEEK_DAYS);
    let mut rates = Vec::with_capacity(WEEK_DAYS as usize);
    for offset in 0..WEEK_DAYS {
        let target_date = previous_start + chrono::Duration::days(offset);
        let (total, done) = completion_counts(uow, user_id, target_date).await?;
        rates.push(rate(total, done));
    }
    Ok(average(&rates))
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round4(values.iter().sum::<f64>() / values.len() as f64)
}

fn trend(current_value: f64, previous_value: f64) -> Trend {
    if current_value > previous_value {
        Trend::Up
    } else if current_value < previous_value {
        Trend::Down
    } else {
        Trend::Flat
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use glk_schemas::{ReadingLog, ReadingLogStatus, User, UserStatus};
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

    #[tokio::test]
    async fn no_activity_yields_zero_rate_and_zero_streak() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "UTC").await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        let summary = recompute_daily(&mut uow, user_id, date).await.unwrap();

        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.streak_days, 0);
        assert_eq!(summary.trend, Trend::Flat);
        assert!(!summary.reading_completed);
    }

    #[tokio::test]
    async fn reading_completion_counts_toward_streak_with_no_exercise() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "UTC").await;
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        uow.reading_logs()
            .save(ReadingLog {
                id: Uuid::new_v4(),
                user_id,
                reading_plan_id: None,
                book_title: None,
                status: ReadingLogStatus::Done,
                pages_read: Some(20),
                created_at: date.and_hms_opt(8, 0, 0).unwrap().and_utc(),
            })
            .await
            .unwrap();

        let summary = recompute_daily(&mut uow, user_id, date).await.unwrap();

        assert!(summary.reading_completed);
        assert_eq!(summary.streak_days, 1);
    }

    #[tokio::test]
    async fn weekly_recompute_adopts_last_day_streak() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = make_user(&mut uow, "UTC").await;
        let start_date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        let weekly = recompute_weekly(&mut uow, user_id, start_date).await.unwrap();

        assert_eq!(weekly.start_date, start_date);
        assert_eq!(weekly.end_date, start_date + chrono::Duration::days(6));
        assert_eq!(weekly.week_avg_completion_rate, 0.0);
        assert_eq!(weekly.streak_days, 0);
    }
}
