//! In-process router tests for glk-daemon, exercised via
//! `tower::ServiceExt::oneshot()` (no network socket bound).
//!
//! `health_check_requires_no_database` runs unconditionally. Everything
//! else touches Postgres through a real `PgUnitOfWorkFactory` and is
//! gated on `DATABASE_URL`, mirroring the SKIP convention used in
//! glk-db's integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use glk_daemon::{routes, state::AppState};

fn connected_db_url() -> Option<String> {
    match std::env::var(glk_db::ENV_DB_URL) {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("SKIP: {} not set", glk_db::ENV_DB_URL);
            None
        }
    }
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn app_state() -> Arc<AppState> {
    let url = std::env::var(glk_db::ENV_DB_URL).expect("checked by caller");
    let pool = glk_db::connect(&url).await.expect("connect");
    glk_db::migrate(&pool).await.expect("migrate");
    let factory = glk_db::PgUnitOfWorkFactory::new(pool);
    Arc::new(AppState::new(factory))
}

// ---------------------------------------------------------------------------
// 1. Health check needs no database at all.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_requires_no_database() {
    // `AppState` always needs a factory, but health never touches it, so a
    // pool-less factory pointed at an unreachable address is fine here —
    // the handler never calls `uow_factory`.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(0)
        .connect_lazy("postgres://unreachable/unreachable")
        .expect("lazy pool construction never touches the network");
    let factory = glk_db::PgUnitOfWorkFactory::new(pool);
    let st = Arc::new(AppState::new(factory));

    let (status, body) = call(routes::build_router(st), get("/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "glk-daemon");
}

// ---------------------------------------------------------------------------
// 2. Resolving the same external_id twice is idempotent (create then fetch).
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_user_is_idempotent_by_external_id() {
    let Some(_) = connected_db_url() else {
        return;
    };
    let st = app_state().await;
    let router = routes::build_router(st);

    let external_id = format!("daemon-test-{}", Uuid::new_v4());
    let req_body = json!({ "external_id": external_id, "name": "Dana" });

    let (status, first) = call(router.clone(), post("/auth/resolve", req_body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);
    let user_id = first["user_id"].as_str().unwrap().to_string();

    let (status, second) = call(router, post("/auth/resolve", req_body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["user_id"], user_id);
}

// ---------------------------------------------------------------------------
// 3. Full happy-path flow: resolve -> generate plan -> submit first set ->
//    daily summary reflects the completed set.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plan_generation_and_set_submission_flow_updates_daily_summary() {
    let Some(_) = connected_db_url() else {
        return;
    };
    let st = app_state().await;
    let router = routes::build_router(st);

    let external_id = format!("daemon-flow-{}", Uuid::new_v4());
    let (_, resolved) = call(
        router.clone(),
        post("/auth/resolve", json!({ "external_id": external_id })),
    )
    .await;
    let user_id = resolved["user_id"].as_str().unwrap().to_string();

    let target_date = "2026-07-28";
    let (status, plan) = call(
        router.clone(),
        post(
            "/plans/generate",
            json!({ "user_id": user_id, "target_date": target_date }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["status"], "active");
    let sessions = plan["sessions"].as_array().unwrap();
    assert!(!sessions.is_empty());
    let plan_id = plan["plan_id"].as_str().unwrap().to_string();
    let first_session = sessions[0]["session_id"].as_str().unwrap().to_string();

    let (status, result) = call(
        router.clone(),
        post(
            &format!("/plans/{plan_id}/sessions/{first_session}/sets/1/result"),
            json!({ "result": "DONE", "performed_reps": 12, "performed_weight_kg": 40.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "done");

    let (status, summary) = call(
        router,
        get(&format!(
            "/summary/daily?user_id={user_id}&date={target_date}"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["done_sets"], 1);
    assert!(summary["total_sets"].as_i64().unwrap() >= 1);
}

// ---------------------------------------------------------------------------
// 4. Submitting a set for a plan that does not exist is a 404, not a 500.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitting_a_set_for_an_unknown_plan_is_not_found() {
    let Some(_) = connected_db_url() else {
        return;
    };
    let st = app_state().await;
    let router = routes::build_router(st);

    let missing_plan = Uuid::new_v4();
    let missing_session = Uuid::new_v4();
    let (status, body) = call(
        router,
        post(
            &format!("/plans/{missing_plan}/sessions/{missing_session}/sets/1/result"),
            json!({ "result": "DONE" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["category"], "not_found");
}

// ---------------------------------------------------------------------------
// 5. Replaying the same webhook idempotency_key is reported as a duplicate.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replayed_webhook_idempotency_key_is_reported_as_duplicate() {
    let Some(_) = connected_db_url() else {
        return;
    };
    let st = app_state().await;
    let router = routes::build_router(st);

    let idempotency_key = format!("wh-{}", Uuid::new_v4());
    let body = json!({
        "event_type": "reading.completed",
        "idempotency_key": idempotency_key,
    });

    let (status, first) = call(router.clone(), post("/webhooks/provider-x", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["result"], "accepted");

    let (status, second) = call(router, post("/webhooks/provider-x", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["result"], "duplicate");
}
