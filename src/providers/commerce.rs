//! Webhook adapter for the `shopstack` commerce platform.
//!
//! Processes order webhooks. The customer name comes from
//! `customer.first_name`/`last_name`, falling back to the email local part
//! and finally `"Someone"`; location comes from the billing address.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::path::{lookup, lookup_str};
use super::{AdapterContext, ProviderAdapter, display_location, display_name};
use crate::domain::RawProviderEvent;
use crate::error::EngineError;

/// Adapter for `shopstack` order webhooks.
#[derive(Debug, Clone, Copy)]
pub struct CommerceAdapter;

impl ProviderAdapter for CommerceAdapter {
    fn id(&self) -> &'static str {
        "shopstack"
    }

    fn canonical_event_type(&self) -> &'static str {
        "purchase"
    }

    fn validate(&self, payload: &Value) -> bool {
        // An order webhook always carries a numeric order id and a
        // customer object, even for guest checkouts.
        lookup_str(payload, "id").is_some() && lookup(payload, "customer").is_some_and(Value::is_object)
    }

    fn process(
        &self,
        _ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError> {
        let native_id = lookup_str(payload, "id").ok_or_else(|| EngineError::MalformedPayload {
            provider: self.id().to_string(),
            reason: "missing order id".to_string(),
        })?;

        let first = lookup_str(payload, "customer.first_name");
        let last = lookup_str(payload, "customer.last_name");
        let email = lookup_str(payload, "customer.email");
        let user_name = display_name(first.as_deref(), last.as_deref(), email.as_deref());

        let city = lookup_str(payload, "billing_address.city");
        let country = lookup_str(payload, "billing_address.country");
        let user_location = display_location(city.as_deref(), country.as_deref());

        let product = lookup_str(payload, "line_items.0.title");
        let message = product
            .as_deref()
            .map_or_else(|| "made a purchase".to_string(), |p| format!("purchased {p}"));

        Ok(vec![RawProviderEvent {
            provider: self.id().to_string(),
            provider_event_type: "order.created".to_string(),
            native_id: Some(native_id),
            user_name: Some(user_name),
            user_location,
            message: Some(message),
            received_at,
            payload: payload.clone(),
        }])
    }
}
