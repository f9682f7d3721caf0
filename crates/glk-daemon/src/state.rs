//! Shared runtime state for glk-daemon: a `Clone`-able `Arc<AppState>`
//! handed to every handler via `State<Arc<AppState>>`, plus a broadcast
//! bus for the `/v1/stream` SSE feed.

use std::sync::Arc;
use std::time::Duration;

use glk_db::PgUnitOfWorkFactory;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    LogLine { level: String, msg: String },
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    pub uow_factory: PgUnitOfWorkFactory,
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(uow_factory: PgUnitOfWorkFactory) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        AppState {
            uow_factory,
            bus,
            build: BuildInfo {
                service: "glk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
