//! Selection endpoint handler.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{NotificationDto, SelectRequest, SelectResponse};
use crate::app_state::AppState;
use crate::domain::{DeviceClass, SiteId, VisitorContext};

/// `POST /sites/:site_id/select` — Pick the next notification.
///
/// Never fails visitor-facing: internal errors are logged and degrade to
/// `{"show": false}` so the embed script can no-op.
#[utoipa::path(
    post,
    path = "/api/v1/sites/{site_id}/select",
    tag = "Selection",
    summary = "Select the next notification",
    description = "Evaluates the site's campaigns against the visitor context and returns at most one notification to render.",
    params(
        ("site_id" = uuid::Uuid, Path, description = "Site UUID"),
    ),
    request_body = SelectRequest,
    responses(
        (status = 200, description = "Selection result (show may be false)", body = SelectResponse),
    )
)]
pub async fn select_notification(
    State(state): State<AppState>,
    Path(site_id): Path<uuid::Uuid>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    let site_id = SiteId::from_uuid(site_id);
    let ctx = VisitorContext {
        visitor_id: req.visitor_id,
        session_id: req.session_id,
        url: req.url,
        country: req.country,
        device: parse_device(req.device.as_deref()),
        now: Utc::now(),
    };

    match state.engine.select_next(site_id, &ctx).await {
        Ok(Some(selected)) => Json(SelectResponse {
            show: true,
            notification: Some(NotificationDto {
                campaign_id: selected.campaign.campaign_id.into(),
                event_id: selected.event.event_id.as_str().to_string(),
                event_type: selected.event.event_type,
                fields: serde_json::Value::Object(
                    selected.event.normalized.into_iter().collect(),
                ),
                timestamp: selected.event.timestamp,
                experiment_id: selected.campaign.experiment_id.map(Into::into),
            }),
        }),
        Ok(None) => Json(SelectResponse {
            show: false,
            notification: None,
        }),
        Err(error) => {
            tracing::warn!(%site_id, %error, "selection failed, degrading to empty");
            Json(SelectResponse {
                show: false,
                notification: None,
            })
        }
    }
}

/// Maps the wire device string to a device class; unknown values fall back
/// to desktop rather than failing the page load.
fn parse_device(device: Option<&str>) -> DeviceClass {
    match device {
        Some("mobile") => DeviceClass::Mobile,
        Some("tablet") => DeviceClass::Tablet,
        _ => DeviceClass::Desktop,
    }
}

/// Selection routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/sites/{site_id}/select", post(select_notification))
}
