//! Exercise-plan service (C4): `generate_plan` and `submit_set_result`.
//! Seeds a new plan from the fixed three-session template and enforces
//! strict same-session set ordering with an idempotent-replay guard on
//! already-terminal sets.

use chrono::{DateTime, NaiveDate, Utc};
use glk_schemas::{
    ExercisePlan, ExerciseSession, ExerciseSetState, NotificationKind, NotificationPayload,
    PlanSource, PlanStatus, SetStatus, SEED_TEMPLATE,
};
use uuid::Uuid;

use crate::error::{CoreError, StoreError};
use crate::notification;
use crate::uow::UnitOfWork;

const ACTIVE_PLAN_CONSTRAINT: &str = "uq_exercise_plans_user_target_date_active";

#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: ExercisePlan,
    pub sessions: Vec<ExerciseSession>,
    pub set_states: Vec<ExerciseSetState>,
    pub start_notification_id: Uuid,
}

/// Create a new ACTIVE plan for `(user_id, target_date)`, seeded from the
/// fixed three-session template, and schedule its `EXERCISE_START`
/// notification.
pub async fn generate_plan(
    uow: &mut dyn UnitOfWork,
    user_id: Uuid,
    target_date: NaiveDate,
    source: &str,
) -> Result<GeneratedPlan, CoreError> {
    let source = normalize_source(source)?;

    if uow
        .exercise_plans()
        .get_active_by_user_and_date(user_id, target_date)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .is_some()
    {
        return Err(CoreError::PlanConflict(format!(
            "an active plan already exists for user {user_id} on {target_date}"
        )));
    }

    let now = Utc::now();
    let plan = ExercisePlan {
        id: Uuid::new_v4(),
        user_id,
        target_date,
        source,
        status: PlanStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let plan = uow
        .exercise_plans()
        .save(plan)
        .await
        .map_err(|e| translate_plan_conflict(e))?;

    let mut sessions = Vec::with_capacity(SEED_TEMPLATE.len());
    let mut set_states = Vec::new();

    for (idx, seed) in SEED_TEMPLATE.iter().enumerate() {
        validate_seed(seed.target_sets, None, None, None)?;

        let session = ExerciseSession {
            id: Uuid::new_v4(),
            plan_id: plan.id,
            order_no: (idx as i32) + 1,
            exercise_name: seed.exercise_name.to_string(),
            body_part: Some(seed.body_part.to_string()),
            target_sets: seed.target_sets,
            target_reps: None,
            target_weight_kg: None,
            target_rest_sec: None,
            notes: None,
            created_at: now,
        };
        let session = uow
            .exercise_sessions()
            .save(session)
            .await
            .map_err(|e| CoreError::Unavailable(e.to_string()))?;

        for set_no in 1..=seed.target_sets {
            let state = ExerciseSetState {
                id: Uuid::new_v4(),
                session_id: session.id,
                set_no,
                status: SetStatus::Pending,
                performed_reps: None,
                performed_weight_kg: None,
                actual_rest_sec: None,
                completed_at: None,
                skipped_at: None,
            };
            let state = uow
                .exercise_set_states()
                .save(state)
                .await
                .map_err(|e| CoreError::Unavailable(e.to_string()))?;
            set_states.push(state);
        }

        sessions.push(session);
    }

    let first_session = &sessions[0];
    let idempotency_key = format!(
        "exercise:start:{}:{}:set:1",
        plan.id, first_session.id
    );
    let payload = NotificationPayload::ExerciseStart {
        plan_id: plan.id,
        session_id: first_session.id,
        set_no: 1,
    };

    let created = notification::create_pending_notification(
        uow,
        user_id,
        NotificationKind::ExerciseStart,
        Some(first_session.id),
        now,
        Some(idempotency_key),
        Some(payload.into_value()),
    )
    .await
    .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    Ok(GeneratedPlan {
        plan,
        sessions,
        set_states,
        start_notification_id: created.id,
    })
}

#[derive(Debug, Clone)]
pub struct SetResultOutcome {
    pub set_state: ExerciseSetState,
    pub next_pending_set_no: Option<i32>,
    pub notification_id: Option<Uuid>,
}

/// Record the outcome of one set. Idempotent on an already-terminal set;
/// enforces strict same-session ordering otherwise.
pub async fn submit_set_result(
    uow: &mut dyn UnitOfWork,
    plan_id: Uuid,
    session_id: Uuid,
    set_no: i32,
    result: &str,
    performed_reps: Option<i32>,
    performed_weight_kg: Option<f64>,
    actual_rest_sec: Option<i32>,
    at: Option<DateTime<Utc>>,
) -> Result<SetResultOutcome, CoreError> {
    if set_no < 1 {
        return Err(CoreError::Validation(format!(
            "set_no must be >= 1, got {set_no}"
        )));
    }

    let plan = uow
        .exercise_plans()
        .get_by_id(plan_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| CoreError::PlanNotFound(format!("plan {plan_id} not found")))?;

    let session = uow
        .exercise_sessions()
        .get_by_id(session_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| CoreError::PlanNotFound(format!("session {session_id} not found")))?;

    if session.plan_id != plan_id {
        return Err(CoreError::ContextMismatch(format!(
            "session {session_id} does not belong to plan {plan_id}"
        )));
    }

    let result = result.trim().to_ascii_uppercase();
    let status = match result.as_str() {
        "DONE" => SetStatus::Done,
        "SKIPPED" => SetStatus::Skipped,
        other => {
            return Err(CoreError::Validation(format!(
                "result must be DONE or SKIPPED, got {other}"
            )))
        }
    };

    let current = uow
        .exercise_set_states()
        .get(session_id, set_no)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| {
            CoreError::PlanNotFound(format!("set {set_no} not found for session {session_id}"))
        })?;

    if current.is_terminal() {
        return Ok(SetResultOutcome {
            set_state: current,
            next_pending_set_no: None,
            notification_id: None,
        });
    }

    let all_states = uow
        .exercise_set_states()
        .list_by_session(session_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    for k in 1..set_no {
        let prior = all_states.iter().find(|s| s.set_no == k);
        let ok = matches!(
            prior.map(|s| s.status),
            Some(SetStatus::Done) | Some(SetStatus::Skipped)
        );
        if !ok {
            return Err(CoreError::SetOrderViolation(format!(
                "set {k} in session {session_id} is not DONE/SKIPPED yet"
            )));
        }
    }

    let at = at.unwrap_or_else(Utc::now);
    let mut updated = current;
    updated.status = status;
    match status {
        SetStatus::Done => {
            updated.completed_at = Some(at);
            updated.performed_reps = performed_reps;
            updated.performed_weight_kg = performed_weight_kg;
            updated.actual_rest_sec = actual_rest_sec;
        }
        SetStatus::Skipped => {
            updated.skipped_at = Some(at);
        }
        _ => unreachable!("status is always Done or Skipped here"),
    }

    let saved = uow
        .exercise_set_states()
        .save(updated)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    if status != SetStatus::Done {
        return Ok(SetResultOutcome {
            set_state: saved,
            next_pending_set_no: None,
            notification_id: None,
        });
    }

    let mut pending = uow
        .exercise_set_states()
        .list_pending(session_id)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
        .into_iter()
        .filter(|s| s.set_no > set_no)
        .collect::<Vec<_>>();
    pending.sort_by_key(|s| s.set_no);

    let Some(next) = pending.into_iter().next() else {
        return Ok(SetResultOutcome {
            set_state: saved,
            next_pending_set_no: None,
            notification_id: None,
        });
    };

    let idempotency_key = format!("exercise:next:{plan_id}:{session_id}:set:{}", next.set_no);
    let payload = NotificationPayload::ExerciseNextSet {
        plan_id,
        session_id,
        set_no: next.set_no,
    };
    let notification = notification::create_pending_notification(
        uow,
        plan.user_id,
        NotificationKind::ExerciseNextSet,
        Some(session_id),
        Utc::now(),
        Some(idempotency_key),
        Some(payload.into_value()),
    )
    .await
    .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    Ok(SetResultOutcome {
        set_state: saved,
        next_pending_set_no: Some(next.set_no),
        notification_id: Some(notification.id),
    })
}

fn normalize_source(raw: &str) -> Result<PlanSource, CoreError> {
    raw.parse::<PlanSource>()
        .map_err(|_| CoreError::InvalidSource(raw.to_string()))
}

fn validate_seed(
    target_sets: i32,
    target_reps: Option<i32>,
    target_weight_kg: Option<f64>,
    target_rest_sec: Option<i32>,
) -> Result<(), CoreError> {
    if target_sets <= 0 {
        return Err(CoreError::Validation("target_sets must be > 0".into()));
    }
    if let Some(reps) = target_reps {
        if reps <= 0 {
            return Err(CoreError::Validation("target_reps must be > 0".into()));
        }
    }
    if let Some(weight) = target_weight_kg {
        if weight < 0.0 {
            return Err(CoreError::Validation("target_weight_kg must be >= 0".into()));
        }
    }
    if let Some(rest) = target_rest_sec {
        if rest < 0 {
            return Err(CoreError::Validation("target_rest_sec must be >= 0".into()));
        }
    }
    Ok(())
}

fn translate_plan_conflict(err: anyhow::Error) -> CoreError {
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        if store_err.is_unique_violation(ACTIVE_PLAN_CONSTRAINT) {
            return CoreError::PlanConflict(format!(
                "active-plan uniqueness violated: {err}"
            ));
        }
    }
    CoreError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glk_testkit::InMemoryUnitOfWork;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn generate_plan_seeds_three_sessions_with_pending_sets_and_start_notification() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();

        let generated = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();

        assert_eq!(generated.plan.status, PlanStatus::Active);
        assert_eq!(generated.sessions.len(), 3);
        assert_eq!(generated.set_states.len(), 9);
        assert!(generated
            .set_states
            .iter()
            .all(|s| s.status == SetStatus::Pending));

        let pending = uow.outbox_events().lease_pending(100).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "NotificationScheduled");
    }

    #[tokio::test]
    async fn generate_plan_rejects_invalid_source() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let err = generate_plan(&mut uow, Uuid::new_v4(), date(2026, 2, 22), "bogus")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn generate_plan_twice_for_same_user_and_date_conflicts() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();

        generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let err = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::PlanConflict(_)));
    }

    #[tokio::test]
    async fn submit_set_result_done_advances_to_next_pending_set_and_schedules_notification() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let generated = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let session = &generated.sessions[0];

        let outcome = submit_set_result(
            &mut uow,
            generated.plan.id,
            session.id,
            1,
            "done",
            Some(10),
            None,
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome.set_state.status, SetStatus::Done);
        assert_eq!(outcome.next_pending_set_no, Some(2));
        assert!(outcome.notification_id.is_some());

        let pending = uow.outbox_events().lease_pending(100).await.unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn submit_set_result_out_of_order_is_rejected() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let generated = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let session = &generated.sessions[0];

        let err = submit_set_result(
            &mut uow,
            generated.plan.id,
            session.id,
            2,
            "DONE",
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::SetOrderViolation(_)));
    }

    #[tokio::test]
    async fn submit_set_result_twice_on_same_set_is_idempotent_and_schedules_no_new_notification() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let generated = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let session = &generated.sessions[0];

        let first = submit_set_result(
            &mut uow,
            generated.plan.id,
            session.id,
            1,
            "DONE",
            Some(10),
            None,
            None,
            None,
        )
        .await
        .unwrap();

        let pending_before = uow.outbox_events().lease_pending(100).await.unwrap().len();

        let second = submit_set_result(
            &mut uow,
            generated.plan.id,
            session.id,
            1,
            "DONE",
            Some(99),
            None,
            None,
            None,
        )
        .await
        .unwrap();

        let pending_after = uow.outbox_events().lease_pending(100).await.unwrap().len();

        assert_eq!(first.set_state.id, second.set_state.id);
        assert_eq!(second.next_pending_set_no, None);
        assert_eq!(second.notification_id, None);
        // performed metrics from the first call are unchanged (no re-mutation)
        assert_eq!(second.set_state.performed_reps, Some(10));
        assert_eq!(pending_before, pending_after);
    }

    #[tokio::test]
    async fn submit_set_result_rejects_session_plan_mismatch() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let plan_a = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let plan_b = generate_plan(&mut uow, user_id, date(2026, 2, 23), "rule")
            .await
            .unwrap();

        let err = submit_set_result(
            &mut uow,
            plan_a.plan.id,
            plan_b.sessions[0].id,
            1,
            "DONE",
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::ContextMismatch(_)));
    }

    #[tokio::test]
    async fn submit_set_result_last_set_done_leaves_no_next_pending_set() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let user_id = Uuid::new_v4();
        let generated = generate_plan(&mut uow, user_id, date(2026, 2, 22), "rule")
            .await
            .unwrap();
        let session = &generated.sessions[0];

        for set_no in 1..=3 {
            let outcome = submit_set_result(
                &mut uow,
                generated.plan.id,
                session.id,
                set_no,
                "DONE",
                Some(10),
                None,
                None,
                None,
            )
            .await
            .unwrap();
            if set_no < 3 {
                assert_eq!(outcome.next_pending_set_no, Some(set_no + 1));
            } else {
                assert_eq!(outcome.next_pending_set_no, None);
                assert_eq!(outcome.notification_id, None);
            }
        }
    }
}
