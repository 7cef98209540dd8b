//! System endpoints: health check, provider catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Registered provider adapter info.
#[derive(Debug, Serialize, ToSchema)]
struct ProviderInfo {
    provider: &'static str,
    canonical_event_type: &'static str,
    ingestion: &'static str,
}

/// `GET /config/providers` — List registered provider adapters.
#[utoipa::path(
    get,
    path = "/config/providers",
    tag = "System",
    summary = "List registered providers",
    description = "Returns every provider adapter the engine can accept deliveries from, with its canonical event type and ingestion style.",
    responses(
        (status = 200, description = "Provider catalog", body = Vec<ProviderInfo>),
    )
)]
pub async fn providers_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.engine.registry();
    let catalog: Vec<ProviderInfo> = registry
        .provider_ids()
        .into_iter()
        .filter_map(|id| {
            let adapter = registry.get(id).ok()?;
            Some(ProviderInfo {
                provider: adapter.id(),
                canonical_event_type: adapter.canonical_event_type(),
                ingestion: if registry.poll_source(id).is_ok() {
                    "polling"
                } else {
                    "webhook"
                },
            })
        })
        .collect();
    (StatusCode::OK, Json(catalog))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/providers", get(providers_handler))
}
