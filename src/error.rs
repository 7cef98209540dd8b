//! Engine error types with HTTP status code mapping.
//!
//! [`EngineError`] is the central error type for the engine. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//!
//! Two outcomes that look like errors are deliberately *not* variants here:
//! a duplicate webhook delivery is acknowledged as success (so the provider
//! stops retrying), and an empty selection result is a valid "show nothing"
//! response. Both are modeled as `Ok` values at the service layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "no adapter registered for provider: shopstack",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`EngineError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                |
/// |-----------|-------------------|----------------------------|
/// | 1000–1999 | Validation/Auth   | 400 Bad Request / 401      |
/// | 2000–2999 | Not Found         | 404 Not Found              |
/// | 3000–3999 | Server/Storage    | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Inbound payload failed the adapter's shape validation.
    #[error("malformed payload from provider {provider}: {reason}")]
    MalformedPayload {
        /// Provider identifier the payload claimed to come from.
        provider: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Campaign targeting configuration failed save-time validation.
    #[error("invalid targeting rule: {0}")]
    InvalidRule(String),

    /// Webhook signature was missing or did not verify.
    #[error("webhook signature rejected for provider {0}")]
    SignatureRejected(String),

    /// No adapter is registered for the given provider id.
    #[error("no adapter registered for provider: {0}")]
    UnknownProvider(String),

    /// The webhook token does not resolve to a configured connector.
    #[error("no connector configured for token: {0}")]
    IntegrationNotConfigured(String),

    /// Campaign with the given ID was not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(uuid::Uuid),

    /// Experiment with the given ID was not found.
    #[error("experiment not found: {0}")]
    ExperimentNotFound(uuid::Uuid),

    /// Storage layer failure.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Internal engine error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedPayload { .. } => 1001,
            Self::InvalidRule(_) => 1002,
            Self::SignatureRejected(_) => 1003,
            Self::UnknownProvider(_) => 2001,
            Self::IntegrationNotConfigured(_) => 2002,
            Self::CampaignNotFound(_) => 2003,
            Self::ExperimentNotFound(_) => 2004,
            Self::StorageError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedPayload { .. } | Self::InvalidRule(_) => StatusCode::BAD_REQUEST,
            Self::SignatureRejected(_) => StatusCode::UNAUTHORIZED,
            Self::UnknownProvider(_)
            | Self::IntegrationNotConfigured(_)
            | Self::CampaignNotFound(_)
            | Self::ExperimentNotFound(_) => StatusCode::NOT_FOUND,
            Self::StorageError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
