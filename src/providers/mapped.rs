//! Generic field-mapping adapter driven by site configuration.
//!
//! For providers without a dedicated adapter, the connector carries
//! user-configured [`FieldMapping`]s: each one walks a dotted-path
//! expression against the raw payload and falls back to its configured
//! default when the path does not resolve. The mapped values land in the
//! raw event's payload under their canonical keys, where the normalizer
//! copies them through.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::path::lookup_str;
use super::{AdapterContext, ProviderAdapter, ANONYMOUS_NAME};
use crate::domain::RawProviderEvent;
use crate::error::EngineError;

/// Adapter for site-configured generic integrations.
#[derive(Debug, Clone, Copy)]
pub struct MappedAdapter;

impl ProviderAdapter for MappedAdapter {
    fn id(&self) -> &'static str {
        "mapped"
    }

    fn canonical_event_type(&self) -> &'static str {
        "manual"
    }

    fn validate(&self, payload: &Value) -> bool {
        payload.is_object()
    }

    fn process(
        &self,
        ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError> {
        if !payload.is_object() {
            return Err(EngineError::MalformedPayload {
                provider: self.id().to_string(),
                reason: "payload is not a JSON object".to_string(),
            });
        }

        let mut mapped = Map::new();
        for mapping in &ctx.field_mappings {
            let value = lookup_str(payload, &mapping.path)
                .unwrap_or_else(|| mapping.default.clone());
            mapped.insert(mapping.canonical_key.clone(), Value::String(value));
        }

        let get = |key: &str| {
            mapped
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let user_name = get("template.customer_name")
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
        let user_location = get("template.customer_location");
        let message = get("template.message");

        let native_id = lookup_str(payload, "id");

        Ok(vec![RawProviderEvent {
            provider: self.id().to_string(),
            provider_event_type: "mapped".to_string(),
            native_id,
            user_name: Some(user_name),
            user_location,
            message,
            received_at,
            payload: Value::Object(mapped),
        }])
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::FieldMapping;
    use serde_json::json;

    fn ctx() -> AdapterContext {
        AdapterContext {
            field_mappings: vec![
                FieldMapping {
                    canonical_key: "template.customer_name".to_string(),
                    path: "buyer.name".to_string(),
                    default: ANONYMOUS_NAME.to_string(),
                },
                FieldMapping {
                    canonical_key: "template.customer_location".to_string(),
                    path: "buyer.address.city".to_string(),
                    default: String::new(),
                },
                FieldMapping {
                    canonical_key: "template.message".to_string(),
                    path: "summary".to_string(),
                    default: "did something".to_string(),
                },
            ],
        }
    }

    #[test]
    fn walks_configured_paths() {
        let payload = json!({
            "id": "x-1",
            "buyer": { "name": "Ken", "address": { "city": "Osaka" } },
            "summary": "joined the waitlist"
        });
        let events = MappedAdapter.process(&ctx(), &payload, Utc::now());
        let Ok(events) = events else {
            panic!("expected processed events");
        };
        let Some(event) = events.first() else {
            panic!("expected one event");
        };
        assert_eq!(event.user_name.as_deref(), Some("Ken"));
        assert_eq!(event.user_location.as_deref(), Some("Osaka"));
        assert_eq!(event.message.as_deref(), Some("joined the waitlist"));
    }

    #[test]
    fn missing_path_substitutes_default() {
        let payload = json!({ "buyer": {} });
        let events = MappedAdapter.process(&ctx(), &payload, Utc::now());
        let Ok(events) = events else {
            panic!("expected processed events");
        };
        let Some(event) = events.first() else {
            panic!("expected one event");
        };
        assert_eq!(event.user_name.as_deref(), Some(ANONYMOUS_NAME));
        assert_eq!(event.message.as_deref(), Some("did something"));
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let result = MappedAdapter.process(&ctx(), &json!([1, 2]), Utc::now());
        assert!(matches!(result, Err(EngineError::MalformedPayload { .. })));
    }
}
