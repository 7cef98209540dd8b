//! Webhook adapter for the `paywave` payment processor.
//!
//! Processes charge-succeeded deliveries. Payment payloads are envelope
//! shaped: the charge object lives under `data.object` and the delivery
//! carries its own event id (`evt_...`), which doubles as the idempotency
//! key upstream.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::path::{lookup, lookup_str};
use super::{AdapterContext, ProviderAdapter, display_name};
use crate::domain::RawProviderEvent;
use crate::error::EngineError;

/// Adapter for `paywave` charge webhooks.
#[derive(Debug, Clone, Copy)]
pub struct PaymentsAdapter;

impl ProviderAdapter for PaymentsAdapter {
    fn id(&self) -> &'static str {
        "paywave"
    }

    fn canonical_event_type(&self) -> &'static str {
        "purchase"
    }

    fn validate(&self, payload: &Value) -> bool {
        lookup_str(payload, "id").is_some() && lookup(payload, "data.object").is_some_and(Value::is_object)
    }

    fn process(
        &self,
        _ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError> {
        let native_id = lookup_str(payload, "id").ok_or_else(|| EngineError::MalformedPayload {
            provider: self.id().to_string(),
            reason: "missing event id".to_string(),
        })?;

        let event_type =
            lookup_str(payload, "type").unwrap_or_else(|| "charge.succeeded".to_string());

        let name = lookup_str(payload, "data.object.billing_details.name");
        let email = lookup_str(payload, "data.object.billing_details.email");
        let user_name = display_name(name.as_deref(), None, email.as_deref());

        let user_location = lookup_str(payload, "data.object.billing_details.address.country");

        let description = lookup_str(payload, "data.object.description");
        let message = description
            .map_or_else(|| "completed a payment".to_string(), |d| format!("paid for {d}"));

        Ok(vec![RawProviderEvent {
            provider: self.id().to_string(),
            provider_event_type: event_type,
            native_id: Some(native_id),
            user_name: Some(user_name),
            user_location,
            message: Some(message),
            received_at,
            payload: payload.clone(),
        }])
    }
}
