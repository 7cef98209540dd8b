//! proofpop-engine server entry point.
//!
//! Starts the Axum HTTP server with the ingestion, selection, and admin
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use proofpop_engine::api;
use proofpop_engine::app_state::AppState;
use proofpop_engine::config::EngineConfig;
use proofpop_engine::domain::EventBus;
use proofpop_engine::providers::AdapterRegistry;
use proofpop_engine::service::EngineService;
use proofpop_engine::store::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = EngineConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting proofpop-engine");

    // Build the storage layer
    let store: Arc<dyn Store> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        let store = PostgresStore::new(pool);
        store.ensure_schema().await?;
        tracing::info!("postgres persistence enabled");
        Arc::new(store)
    } else {
        tracing::warn!("persistence disabled, running on the in-memory store");
        Arc::new(MemoryStore::new())
    };

    // Build domain and service layers
    let event_bus = EventBus::new(config.event_bus_capacity);
    let registry = Arc::new(AdapterRegistry::with_builtins());
    let engine = Arc::new(EngineService::new(
        store,
        registry,
        event_bus.clone(),
        config.dedup_retention_hours,
        config.dedup_bucket_secs,
    ));

    // Build application state
    let app_state = AppState { engine, event_bus };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
