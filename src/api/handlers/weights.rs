//! Weight administration handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{UpdateWeightsRequest, WeightDto, WeightsResponse};
use crate::app_state::AppState;
use crate::domain::{NotificationWeight, SiteId};
use crate::error::{EngineError, ErrorResponse};

fn response(site_id: SiteId, weights: Vec<NotificationWeight>) -> Json<WeightsResponse> {
    Json(WeightsResponse {
        site_id: site_id.into(),
        weights: weights.into_iter().map(WeightDto::from).collect(),
    })
}

/// `GET /sites/:site_id/weights` — Read the site's weight table.
///
/// # Errors
///
/// Returns [`EngineError::StorageError`] on backend failure.
#[utoipa::path(
    get,
    path = "/api/v1/sites/{site_id}/weights",
    tag = "Weights",
    summary = "Read weight table",
    description = "Returns the site's per-event-type weight rows, seeding built-in defaults for any missing type.",
    params(
        ("site_id" = uuid::Uuid, Path, description = "Site UUID"),
    ),
    responses(
        (status = 200, description = "Weight table", body = WeightsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn get_weights(
    State(state): State<AppState>,
    Path(site_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let site_id = SiteId::from_uuid(site_id);
    let weights = state.engine.site_weights(site_id).await?;
    Ok(response(site_id, weights))
}

/// `PUT /sites/:site_id/weights` — Update weight rows.
///
/// # Errors
///
/// Returns [`EngineError::StorageError`] on backend failure.
#[utoipa::path(
    put,
    path = "/api/v1/sites/{site_id}/weights",
    tag = "Weights",
    summary = "Update weight rows",
    description = "Upserts the given weight rows for the site. Setting max_per_queue to 0 disables an event type.",
    params(
        ("site_id" = uuid::Uuid, Path, description = "Site UUID"),
    ),
    request_body = UpdateWeightsRequest,
    responses(
        (status = 200, description = "Updated weight table", body = WeightsResponse),
        (status = 400, description = "Invalid weight row", body = ErrorResponse),
    )
)]
pub async fn put_weights(
    State(state): State<AppState>,
    Path(site_id): Path<uuid::Uuid>,
    Json(req): Json<UpdateWeightsRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let site_id = SiteId::from_uuid(site_id);
    let rows = req
        .weights
        .into_iter()
        .map(|dto| dto.into_domain(site_id))
        .collect();
    let weights = state.engine.update_weights(site_id, rows).await?;
    Ok(response(site_id, weights))
}

/// `POST /sites/:site_id/weights/reset` — Reset to built-in defaults.
///
/// # Errors
///
/// Returns [`EngineError::StorageError`] on backend failure.
#[utoipa::path(
    post,
    path = "/api/v1/sites/{site_id}/weights/reset",
    tag = "Weights",
    summary = "Reset weights to defaults",
    description = "Replaces the site's weight table with the built-in defaults.",
    params(
        ("site_id" = uuid::Uuid, Path, description = "Site UUID"),
    ),
    responses(
        (status = 200, description = "Default weight table", body = WeightsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn reset_weights(
    State(state): State<AppState>,
    Path(site_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let site_id = SiteId::from_uuid(site_id);
    let weights = state.engine.reset_weights(site_id).await?;
    Ok(response(site_id, weights))
}

/// Weight administration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sites/{site_id}/weights", get(get_weights))
        .route("/sites/{site_id}/weights", put(put_weights))
        .route("/sites/{site_id}/weights/reset", post(reset_weights))
}
