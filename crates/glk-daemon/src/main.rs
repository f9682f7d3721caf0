//! glk-daemon entry point.
//!
//! Intentionally thin: sets up tracing, builds the shared state, wires
//! middleware, and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use glk_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; silent if the file does not exist — production
    // injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = glk_config::AppConfig::from_env().context("loading configuration")?;

    let pool = glk_db::connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    glk_db::migrate(&pool).await.context("running migrations")?;

    let uow_factory = glk_db::PgUnitOfWorkFactory::new(pool);
    let shared = Arc::new(state::AppState::new(uow_factory));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(30));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = SocketAddr::new(config.host.parse().context("invalid HOST")?, config.port);
    info!("glk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins, matching the reference daemon's
/// dev-facing default.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
