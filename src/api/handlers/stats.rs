//! Stats beacon handlers (view/click).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{StatsAck, StatsRequest};
use crate::app_state::AppState;
use crate::domain::CampaignId;
use crate::error::{EngineError, ErrorResponse};

/// `POST /notifications/:campaign/view` — Record a rendered notification.
///
/// # Errors
///
/// Returns [`EngineError::CampaignNotFound`] for an unknown campaign.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{campaign}/view",
    tag = "Stats",
    summary = "Record a view",
    description = "Beacon fired when a notification actually rendered. Feeds the campaign's A/B test when the body names a variant.",
    params(
        ("campaign" = uuid::Uuid, Path, description = "Campaign UUID"),
    ),
    request_body = StatsRequest,
    responses(
        (status = 200, description = "View recorded", body = StatsAck),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    Path(campaign): Path<uuid::Uuid>,
    body: Option<Json<StatsRequest>>,
) -> Result<impl IntoResponse, EngineError> {
    let variant = body.as_ref().and_then(|b| b.variant.as_deref());
    state
        .engine
        .record_view(CampaignId::from_uuid(campaign), variant)
        .await?;
    Ok(Json(StatsAck { status: "recorded" }))
}

/// `POST /notifications/:campaign/click` — Record a notification click.
///
/// # Errors
///
/// Returns [`EngineError::CampaignNotFound`] for an unknown campaign.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{campaign}/click",
    tag = "Stats",
    summary = "Record a click",
    description = "Beacon fired when a visitor clicked a notification. Feeds the campaign's A/B test when the body names a variant.",
    params(
        ("campaign" = uuid::Uuid, Path, description = "Campaign UUID"),
    ),
    request_body = StatsRequest,
    responses(
        (status = 200, description = "Click recorded", body = StatsAck),
        (status = 404, description = "Campaign not found", body = ErrorResponse),
    )
)]
pub async fn record_click(
    State(state): State<AppState>,
    Path(campaign): Path<uuid::Uuid>,
    body: Option<Json<StatsRequest>>,
) -> Result<impl IntoResponse, EngineError> {
    let variant = body.as_ref().and_then(|b| b.variant.as_deref());
    state
        .engine
        .record_click(CampaignId::from_uuid(campaign), variant)
        .await?;
    Ok(Json(StatsAck { status: "recorded" }))
}

/// Stats routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/{campaign}/view", post(record_view))
        .route("/notifications/{campaign}/click", post(record_click))
}
