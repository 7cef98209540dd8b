//! Selection request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Visitor context sent by the embed script with each selection request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SelectRequest {
    /// Stable visitor identifier (first-party cookie).
    pub visitor_id: String,
    /// Session identifier, rotated per browsing session.
    pub session_id: String,
    /// Full URL of the page requesting a notification.
    pub url: String,
    /// ISO country code resolved by the caller, when known.
    #[serde(default)]
    pub country: Option<String>,
    /// Device class: `"desktop"`, `"mobile"`, or `"tablet"`.
    #[serde(default)]
    pub device: Option<String>,
}

/// Selection response. `show` is `false` whenever nothing is eligible —
/// the endpoint never errors visitor-facing.
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectResponse {
    /// Whether the embed should render a notification.
    pub show: bool,
    /// The notification to render, present iff `show` is `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationDto>,
}

/// One renderable notification.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationDto {
    /// Campaign the notification belongs to.
    pub campaign_id: uuid::Uuid,
    /// Stable event identifier, for client-side dedup.
    pub event_id: String,
    /// Canonical event type (`"purchase"`, `"review"`, ...).
    pub event_type: String,
    /// Normalized fields keyed by the canonical vocabulary.
    #[schema(value_type = Object)]
    pub fields: serde_json::Value,
    /// When the underlying event happened.
    pub timestamp: DateTime<Utc>,
    /// Experiment attached to the campaign, when one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<uuid::Uuid>,
}
