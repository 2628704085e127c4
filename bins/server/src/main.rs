//! Vitrine API Server
//!
//! Main entry point for the branch-scoped reporting service.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitrine_api::{AppState, create_router};
use vitrine_core::reports::ReportEngine;
use vitrine_db::{BranchGrantRepository, StoredProcedureSource, connect_with};
use vitrine_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;

    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    let jwt_service = JwtService::new(&JwtConfig {
        secret: config.jwt.secret.clone(),
        leeway_secs: config.jwt.leeway_secs,
    });

    let engine = ReportEngine::new(
        Arc::new(BranchGrantRepository::new(db.clone())),
        Arc::new(StoredProcedureSource::new(
            db,
            config.reports.tenant_cache_ttl(),
        )),
        config.reports.clone(),
    );
    info!(
        fetch_timeout_secs = config.reports.fetch_timeout_secs,
        max_concurrent_fetches = config.reports.max_concurrent_fetches,
        "Report engine configured"
    );

    let state = AppState {
        reports: Arc::new(engine),
        jwt_service: Arc::new(jwt_service),
    };

    let app = create_router(state).layer(TimeoutLayer::with_status_code(
        StatusCode::GATEWAY_TIMEOUT,
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Installs the global subscriber; `VITRINE_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vitrine=debug,tower_http=debug".into());

    let json = std::env::var("VITRINE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
