//! Webhook ingress handler.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::error::{EngineError, ErrorResponse};

/// Header carrying the hex-encoded HMAC-SHA256 signature, for providers
/// configured with a signing secret.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// `POST /hooks/:provider/:token` — Webhook ingress.
///
/// # Errors
///
/// Returns [`EngineError`] on an unknown provider, an unconfigured token,
/// a failed signature check, or a malformed payload. A replayed delivery
/// is not an error: it acknowledges 200 with `duplicates` counted.
#[utoipa::path(
    post,
    path = "/hooks/{provider}/{token}",
    tag = "Webhooks",
    summary = "Webhook ingress",
    description = "Accepts one provider delivery, deduplicates it, normalizes it, and admits the resulting events to the site's queue.",
    params(
        ("provider" = String, Path, description = "Provider id (shopstack, paywave, formly, ratewise, mapped)"),
        ("token" = String, Path, description = "Connector token issued at integration setup"),
    ),
    responses(
        (status = 200, description = "Delivery handled (including duplicates)", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Signature rejected", body = ErrorResponse),
        (status = 404, description = "Unknown provider or unconfigured token", body = ErrorResponse),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path((provider, token)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, EngineError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .engine
        .handle_webhook(&provider, &token, signature, body.as_bytes())
        .await?;

    Ok(Json(WebhookAck {
        status: "ok",
        processed: outcome.processed,
        duplicates: outcome.duplicates,
        skipped: outcome.skipped,
    }))
}

/// `POST /sites/:site_id/sync/:provider` — Run one polling sync pass.
///
/// # Errors
///
/// Returns [`EngineError::UnknownProvider`] when the provider has no poll
/// source, or [`EngineError::IntegrationNotConfigured`] when the site has
/// no connector for it.
#[utoipa::path(
    post,
    path = "/api/v1/sites/{site_id}/sync/{provider}",
    tag = "Webhooks",
    summary = "Run a polling sync pass",
    description = "Fetches one page from a polling-style provider and pushes its items through the ingestion pipeline. An external scheduler drives the paging.",
    params(
        ("site_id" = uuid::Uuid, Path, description = "Site UUID"),
        ("provider" = String, Path, description = "Polling provider id"),
    ),
    responses(
        (status = 200, description = "Sync pass complete", body = SyncAck),
        (status = 404, description = "Unknown provider or unconfigured integration", body = ErrorResponse),
    )
)]
pub async fn run_sync(
    State(state): State<AppState>,
    Path((site_id, provider)): Path<(uuid::Uuid, String)>,
) -> Result<impl IntoResponse, EngineError> {
    let outcome = state
        .engine
        .run_poll(crate::domain::SiteId::from_uuid(site_id), &provider)
        .await?;
    Ok(Json(SyncAck {
        status: "ok",
        fetched: outcome.fetched,
        processed: outcome.processed,
        duplicates: outcome.duplicates,
        skipped: outcome.skipped,
        next_cursor: outcome.next_cursor,
    }))
}

/// Acknowledgement for one polling sync pass.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct SyncAck {
    /// Always `"ok"` for a 2xx response.
    pub status: &'static str,
    /// Items on the fetched page.
    pub fetched: usize,
    /// Events admitted to the queue.
    pub processed: usize,
    /// Items dropped as duplicates.
    pub duplicates: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Cursor for the next pass, absent when the source is exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Webhook routes, mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/hooks/{provider}/{token}", post(receive_webhook))
}

/// Sync routes, mounted under /api/v1.
pub fn sync_routes() -> Router<AppState> {
    Router::new().route("/sites/{site_id}/sync/{provider}", post(run_sync))
}
