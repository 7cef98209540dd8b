//! Webhook adapter for the `formly` form tool.
//!
//! Processes form-submission deliveries. Form payloads carry an answers
//! array; the adapter picks out well-known field keys (name, email,
//! country) and uses the first long-text answer as the message.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::path::{lookup, lookup_str};
use super::{AdapterContext, ProviderAdapter, display_name};
use crate::domain::RawProviderEvent;
use crate::error::EngineError;

/// Adapter for `formly` submission webhooks.
#[derive(Debug, Clone, Copy)]
pub struct FormsAdapter;

/// Finds the answer value for a given field key in the answers array.
fn answer_for<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    let answers = lookup(payload, "form_response.answers")?.as_array()?;
    answers.iter().find_map(|a| {
        let field_key = a.get("field").and_then(|f| f.get("key")).and_then(Value::as_str)?;
        if field_key == key {
            a.get("text").and_then(Value::as_str)
        } else {
            None
        }
    })
}

impl ProviderAdapter for FormsAdapter {
    fn id(&self) -> &'static str {
        "formly"
    }

    fn canonical_event_type(&self) -> &'static str {
        "submission"
    }

    fn validate(&self, payload: &Value) -> bool {
        lookup(payload, "form_response.answers").is_some_and(Value::is_array)
    }

    fn process(
        &self,
        _ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError> {
        if !self.validate(payload) {
            return Err(EngineError::MalformedPayload {
                provider: self.id().to_string(),
                reason: "missing form_response.answers".to_string(),
            });
        }

        let native_id = lookup_str(payload, "form_response.token");
        let name = answer_for(payload, "name");
        let email = answer_for(payload, "email");
        let user_name = display_name(name, None, email);
        let user_location = answer_for(payload, "country").map(str::to_string);
        let message = answer_for(payload, "message")
            .map_or_else(|| "submitted the form".to_string(), str::to_string);

        Ok(vec![RawProviderEvent {
            provider: self.id().to_string(),
            provider_event_type: "form_response".to_string(),
            native_id,
            user_name: Some(user_name),
            user_location,
            message: Some(message),
            received_at,
            payload: payload.clone(),
        }])
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission() -> Value {
        json!({
            "form_response": {
                "token": "resp-77",
                "answers": [
                    { "field": { "key": "name" }, "text": "Miguel" },
                    { "field": { "key": "email" }, "text": "miguel@example.com" },
                    { "field": { "key": "message" }, "text": "Signed up for the beta" }
                ]
            }
        })
    }

    #[test]
    fn answers_array_is_required() {
        assert!(FormsAdapter.validate(&submission()));
        assert!(!FormsAdapter.validate(&json!({ "form_response": {} })));
    }

    #[test]
    fn picks_well_known_answer_keys() {
        let events = FormsAdapter.process(&AdapterContext::default(), &submission(), Utc::now());
        let Ok(events) = events else {
            panic!("expected processed events");
        };
        let Some(event) = events.first() else {
            panic!("expected one event");
        };
        assert_eq!(event.native_id.as_deref(), Some("resp-77"));
        assert_eq!(event.user_name.as_deref(), Some("Miguel"));
        assert_eq!(event.message.as_deref(), Some("Signed up for the beta"));
    }

    #[test]
    fn nameless_submission_still_processes() {
        let payload = json!({ "form_response": { "answers": [] } });
        let events = FormsAdapter.process(&AdapterContext::default(), &payload, Utc::now());
        let Ok(events) = events else {
            panic!("expected processed events");
        };
        assert_eq!(
            events.first().and_then(|e| e.user_name.as_deref()),
            Some(super::super::ANONYMOUS_NAME)
        );
    }
}
