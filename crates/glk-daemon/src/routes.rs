//! Axum router and HTTP handlers for glk-daemon. `build_router` is the
//! single entry point; `main.rs` calls it and attaches middleware layers.
//! Route table lives in one function; handlers are free functions taking
//! `State<Arc<AppState>>`, JSON in/out via `axum::Json`.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use glk_core::uow::run_in_transaction;
use glk_core::{exercise_plan, reading_reminder, summary, webhook, CoreError};
use glk_schemas::{NewWebhookEvent, User, UserStatus};

use crate::api_types::{
    DailySummaryResponse, EmbeddedSetResultRequest, ErrorResponse, GeneratePlanRequest,
    GeneratePlanResponse, HealthResponse, NotificationRetryRequest, NotificationRetryResponse,
    ReminderResponse, ResolveUserRequest, ResolveUserResponse, ScheduleDailyReminderRequest,
    ScheduleRetryReminderRequest, SessionView, SubmitSetResultRequest, SubmitSetResultResponse,
    SummaryQuery, WebhookRequest, WebhookResponse, WeeklySummaryResponse,
};
use crate::error::{ApiError, InternalError};
use crate::state::{AppState, BusMsg};

/// Build the complete application router wired to the given shared state.
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/auth/resolve", post(resolve_user))
        .route("/plans/generate", post(generate_plan))
        .route(
            "/plans/:plan_id/sessions/:session_id/sets/:set_no/result",
            post(submit_set_result),
        )
        .route("/reading/reminders/base", post(schedule_daily_reminder))
        .route("/reading/reminders/retry", post(schedule_retry_reminder))
        .route("/webhooks/:provider", post(handle_webhook))
        .route("/summary/daily", get(summary_daily))
        .route("/summary/weekly", get(summary_weekly))
        .route("/notifications/retry", post(notifications_retry))
        .with_state(state)
}

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

/// `POST /auth/resolve` — create-or-fetch a `User` by `external_id`.
pub(crate) async fn resolve_user(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ResolveUserRequest>,
) -> Response {
    let external_id = body.external_id.trim().to_string();
    if external_id.is_empty() {
        return ApiError(CoreError::Validation("external_id must not be empty".into())).into_response();
    }

    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            if let Some(existing) = uow.users().get_by_external_id(&external_id).await? {
                return Ok((existing, false));
            }
            let now = Utc::now();
            let display_name = body
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "member".to_string());
            let user = uow
                .users()
                .save(User {
                    id: Uuid::new_v4(),
                    external_id,
                    display_name,
                    timezone: glk_schemas::DEFAULT_TIMEZONE.to_string(),
                    status: UserStatus::Active,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            Ok((user, true))
        })
    })
    .await;

    match result {
        Ok((user, created)) => (
            StatusCode::OK,
            Json(ResolveUserResponse {
                user_id: user.id,
                external_id: user.external_id,
                display_name: user.display_name,
                created,
            }),
        )
            .into_response(),
        Err(err) => InternalError(err).into_response(),
    }
}

pub(crate) async fn generate_plan(
    State(st): State<Arc<AppState>>,
    Json(body): Json<GeneratePlanRequest>,
) -> Response {
    let source = body.source.unwrap_or_else(|| "rule".to_string());
    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            exercise_plan::generate_plan(uow, body.user_id, body.target_date, &source)
                .await
                .map_err(anyhow::Error::from)
        })
    })
    .await;

    match result {
        Ok(generated) => (
            StatusCode::CREATED,
            Json(GeneratePlanResponse {
                plan_id: generated.plan.id,
                status: generated.plan.status.as_str().to_string(),
                sessions: generated
                    .sessions
                    .iter()
                    .map(|s| SessionView {
                        session_id: s.id,
                        order_no: s.order_no,
                        exercise_name: s.exercise_name.clone(),
                        target_sets: s.target_sets,
                    })
                    .collect(),
                start_notification_id: generated.start_notification_id,
            }),
        )
            .into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

pub(crate) async fn submit_set_result(
    State(st): State<Arc<AppState>>,
    axum::extract::Path((plan_id, session_id, set_no)): axum::extract::Path<(Uuid, Uuid, i32)>,
    Json(body): Json<SubmitSetResultRequest>,
) -> Response {
    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            exercise_plan::submit_set_result(
                uow,
                plan_id,
                session_id,
                set_no,
                &body.result,
                body.performed_reps,
                body.performed_weight_kg,
                body.actual_rest_sec,
                None,
            )
            .await
            .map_err(anyhow::Error::from)
        })
    })
    .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SubmitSetResultResponse {
                set_no: outcome.set_state.set_no,
                status: outcome.set_state.status.as_str().to_string(),
                next_pending_set_no: outcome.next_pending_set_no,
                notification_id: outcome.notification_id,
            }),
        )
            .into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

pub(crate) async fn schedule_daily_reminder(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ScheduleDailyReminderRequest>,
) -> Response {
    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            reading_reminder::schedule_daily_reminder(
                uow,
                body.user_id,
                body.reference_date,
                body.idempotency_key,
            )
            .await
            .map_err(anyhow::Error::from)
        })
    })
    .await;

    match result {
        Ok(outcome) => (StatusCode::OK, Json(reminder_response(outcome))).into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

pub(crate) async fn schedule_retry_reminder(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ScheduleRetryReminderRequest>,
) -> Response {
    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            reading_reminder::schedule_retry_if_incomplete(
                uow,
                body.user_id,
                body.reference_date,
                body.base_notification_id,
                body.idempotency_key,
            )
            .await
            .map_err(anyhow::Error::from)
        })
    })
    .await;

    match result {
        Ok(outcome) => (StatusCode::OK, Json(reminder_response(outcome))).into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

fn reminder_response(outcome: reading_reminder::ReminderOutcome) -> ReminderResponse {
    let result = match outcome.result {
        reading_reminder::ReminderResult::Created => "created",
        reading_reminder::ReminderResult::Duplicate => "duplicate",
        reading_reminder::ReminderResult::SkippedDisabled => "skipped_disabled",
        reading_reminder::ReminderResult::SkippedCompleted => "skipped_completed",
    };
    ReminderResponse {
        result: result.to_string(),
        notification_id: outcome.notification_id,
        schedule_at: outcome.schedule_at,
    }
}

pub(crate) async fn handle_webhook(
    State(st): State<Arc<AppState>>,
    axum::extract::Path(provider): axum::extract::Path<String>,
    Json(body): Json<WebhookRequest>,
) -> Response {
    let dispatch = body.set_result.map(embedded_set_result);
    let new_event = NewWebhookEvent {
        provider,
        event_type: body.event_type,
        user_id: body.user_id,
        idempotency_key: body.idempotency_key,
        event_id: body.event_id,
        raw_payload: body.raw_payload,
        reason_code: body.reason_code,
        signature_state: body.signature_state,
    };

    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move { webhook::handle_event(uow, new_event, dispatch).await.map_err(anyhow::Error::from) })
    })
    .await;

    match result {
        Ok(outcome) => {
            let result = match outcome.result {
                webhook::WebhookResult::Accepted => "accepted",
                webhook::WebhookResult::Duplicate => "duplicate",
            };
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    result: result.to_string(),
                    event_id: outcome.event.id,
                    set_result: outcome.set_result.map(|sr| SubmitSetResultResponse {
                        set_no: sr.set_state.set_no,
                        status: sr.set_state.status.as_str().to_string(),
                        next_pending_set_no: sr.next_pending_set_no,
                        notification_id: sr.notification_id,
                    }),
                }),
            )
                .into_response()
        }
        Err(err) => map_core_or_internal(err),
    }
}

fn embedded_set_result(r: EmbeddedSetResultRequest) -> webhook::EmbeddedSetResult {
    webhook::EmbeddedSetResult {
        plan_id: r.plan_id,
        session_id: r.session_id,
        set_no: r.set_no,
        result: r.result,
        performed_reps: r.performed_reps,
        performed_weight_kg: r.performed_weight_kg,
        actual_rest_sec: r.actual_rest_sec,
    }
}

pub(crate) async fn summary_daily(
    State(st): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let Some(date) = query.date else {
        return ApiError(CoreError::Validation("date is required".into())).into_response();
    };

    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move { Ok(summary::recompute_daily(uow, query.user_id, date).await?) })
    })
    .await;

    match result {
        Ok(s) => (
            StatusCode::OK,
            Json(DailySummaryResponse {
                user_id: s.user_id,
                summary_date: s.summary_date,
                total_sets: s.total_sets,
                done_sets: s.done_sets,
                completion_rate: s.completion_rate,
                reading_completed: s.reading_completed,
                streak_days: s.streak_days,
                trend: s.trend.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

pub(crate) async fn summary_weekly(
    State(st): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let Some(start_date) = query.start_date else {
        return ApiError(CoreError::Validation("start_date is required".into())).into_response();
    };

    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move { Ok(summary::recompute_weekly(uow, query.user_id, start_date).await?) })
    })
    .await;

    match result {
        Ok(s) => (
            StatusCode::OK,
            Json(WeeklySummaryResponse {
                user_id: s.user_id,
                start_date: s.start_date,
                end_date: s.end_date,
                week_avg_completion_rate: s.week_avg_completion_rate,
                streak_days: s.streak_days,
                trend: s.trend.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(err) => map_core_or_internal(err),
    }
}

pub(crate) async fn notifications_retry(
    State(st): State<Arc<AppState>>,
    Json(body): Json<NotificationRetryRequest>,
) -> Response {
    let result = run_in_transaction(&st.uow_factory, |uow| {
        Box::pin(async move {
            Ok(glk_core::notification::mark_as_retried(uow, body.notification_id).await?)
        })
    })
    .await;

    match result {
        Ok(Some(notification)) => (
            StatusCode::OK,
            Json(NotificationRetryResponse {
                notification_id: notification.id,
                status: notification.status.as_str().to_string(),
                retry_count: notification.retry_count,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "notification not found".to_string(),
                category: "not_found",
            }),
        )
            .into_response(),
        Err(err) => InternalError(err).into_response(),
    }
}

/// `CoreError` arrives wrapped in `anyhow::Error` from `run_in_transaction`
/// (whose closures return `anyhow::Result`); unwrap it back to the typed
/// variant when present so the transport-status mapping in `error.rs`
/// applies, otherwise fall back to a bare 500.
fn map_core_or_internal(err: anyhow::Error) -> Response {
    match err.downcast::<CoreError>() {
        Ok(core_err) => ApiError(core_err).into_response(),
        Err(err) => InternalError(err).into_response(),
    }
}

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(rx: broadcast::Receiver<BusMsg>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None,
        }
    })
}
