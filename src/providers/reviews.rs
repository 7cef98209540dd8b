//! Polling adapter for the `ratewise` review platform.
//!
//! Reviews are not pushed — an external scheduler drives paging through
//! the provider's API via a [`super::PollSource`] and feeds each item
//! through this adapter exactly like a webhook body. Items carry a star
//! rating; values outside 1–5 survive here untouched and are clamped by
//! the normalizer.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::path::lookup_str;
use super::{AdapterContext, ProviderAdapter, display_name};
use crate::domain::RawProviderEvent;
use crate::error::EngineError;

/// Adapter for `ratewise` review items.
#[derive(Debug, Clone, Copy)]
pub struct ReviewsAdapter;

impl ProviderAdapter for ReviewsAdapter {
    fn id(&self) -> &'static str {
        "ratewise"
    }

    fn canonical_event_type(&self) -> &'static str {
        "review"
    }

    fn validate(&self, payload: &Value) -> bool {
        lookup_str(payload, "review_id").is_some()
    }

    fn process(
        &self,
        _ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError> {
        let native_id =
            lookup_str(payload, "review_id").ok_or_else(|| EngineError::MalformedPayload {
                provider: self.id().to_string(),
                reason: "missing review_id".to_string(),
            })?;

        let reviewer = lookup_str(payload, "reviewer.display_name");
        let user_name = display_name(reviewer.as_deref(), None, None);
        let user_location = lookup_str(payload, "reviewer.location");
        let message = lookup_str(payload, "text")
            .unwrap_or_else(|| "left a review".to_string());

        Ok(vec![RawProviderEvent {
            provider: self.id().to_string(),
            provider_event_type: "review.published".to_string(),
            native_id: Some(native_id),
            user_name: Some(user_name),
            user_location,
            message: Some(message),
            received_at,
            payload: payload.clone(),
        }])
    }
}
