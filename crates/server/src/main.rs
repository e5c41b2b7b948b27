// creatorflow server binary

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use creatorflow_server::telemetry::{init_telemetry, TelemetryConfig};
use creatorflow_server::{build_engine, router, AppState, ServerConfig, WaitScheduler};
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_telemetry(TelemetryConfig::from_env());
    tracing::info!("creatorflow-server starting...");

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let engine = build_engine(&config).await?;

    // Wait scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = WaitScheduler::new(
        engine.clone(),
        config.wait_poll_interval,
        config.wait_poll_batch,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let cors_origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let app = router(AppState::new(engine));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
        )
    } else {
        app
    };

    let app = app.layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, waiting for scheduler");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::warn!(error = %e, "wait scheduler task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
