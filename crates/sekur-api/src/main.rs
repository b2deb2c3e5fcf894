//! # sekur-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the escrow settlement engine.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use sekur_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let config = AppConfig::from_env();
    let port = config.port;

    // Initialize database pool (optional — absent means in-memory only).
    let db_pool = sekur_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    // Post-commit notification fan-out through a bounded outbox.
    let (emitter, _drain) = sekur_api::outbox::spawn(sekur_api::outbox::DEFAULT_CAPACITY);

    let state = AppState::with_config(config, db_pool, Arc::new(emitter));

    // Hydrate in-memory stores from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    // Auto-escalation sweep for stale held escrows (if configured).
    let _sweep = sekur_api::sweep::spawn(state.clone());

    let app = sekur_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Sekur API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
