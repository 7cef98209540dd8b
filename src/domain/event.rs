//! Raw and canonical event representations.
//!
//! [`RawProviderEvent`] is the short-lived, provider-shaped bag of fields an
//! adapter extracts from one inbound delivery. [`CanonicalEvent`] is the
//! stable unit the rest of the engine operates on: a fixed vocabulary of
//! `template.*` and `meta.*` keys, independent of the source provider's
//! schema. The raw payload is retained on the canonical event for debugging.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{CampaignId, EventId, SiteId};

/// Canonical key vocabulary used in [`CanonicalEvent::normalized`].
pub mod keys {
    /// Display name of the acting customer/visitor.
    pub const CUSTOMER_NAME: &str = "template.customer_name";
    /// Human-readable location ("London, GB").
    pub const CUSTOMER_LOCATION: &str = "template.customer_location";
    /// Product or plan name, when the provider reports one.
    pub const PRODUCT_NAME: &str = "template.product_name";
    /// Free-form message (review text, form answer, manual entry).
    pub const MESSAGE: &str = "template.message";
    /// Star rating, clamped to 1–5.
    pub const RATING: &str = "template.rating";
    /// Monetary amount as a number, when the provider reports one.
    pub const AMOUNT: &str = "template.amount";
    /// ISO currency code accompanying `template.amount`.
    pub const CURRENCY: &str = "template.currency";
    /// Originating provider id.
    pub const SOURCE: &str = "meta.source";
    /// Provider-side status string ("paid", "completed", ...).
    pub const STATUS: &str = "meta.status";
    /// Provider-native transaction/event id, when delivered.
    pub const NATIVE_ID: &str = "meta.native_id";
}

/// Provider-specific event as extracted by an adapter from one delivery.
///
/// Ephemeral: created per inbound item, consumed by the normalizer, and
/// discarded. `payload` keeps the item's raw subtree verbatim for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProviderEvent {
    /// Provider id the adapter that produced this event is registered under.
    pub provider: String,
    /// Provider-native event type string (e.g. `"order.created"`).
    pub provider_event_type: String,
    /// Provider-native transaction/event id, when the payload carries one.
    pub native_id: Option<String>,
    /// Display name extracted by the adapter's provider-specific
    /// heuristics (name-part concatenation, email local-part fallback).
    pub user_name: Option<String>,
    /// Location string extracted by the adapter ("London, GB").
    pub user_location: Option<String>,
    /// Human-readable message extracted by the adapter.
    pub message: Option<String>,
    /// When the delivery reached the engine.
    pub received_at: DateTime<Utc>,
    /// Raw payload subtree for this item.
    pub payload: Value,
}

/// Provider-agnostic event with a fixed normalized key vocabulary.
///
/// Invariant: normalization is deterministic — the same
/// [`RawProviderEvent`] always yields the same `normalized` map. The map is
/// a `BTreeMap` so iteration and serialization order are stable too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Derived unique identifier (see [`EventId`]).
    pub event_id: EventId,
    /// Site the originating connector belongs to.
    pub site_id: SiteId,
    /// Campaign the originating connector feeds.
    pub campaign_id: CampaignId,
    /// Originating provider id.
    pub provider: String,
    /// Provider-native event type string.
    pub provider_event_type: String,
    /// Canonical event type used for weighting (e.g. `"purchase"`).
    pub event_type: String,
    /// Event timestamp (provider-reported when available, else receipt time).
    pub timestamp: DateTime<Utc>,
    /// Normalized `template.*` / `meta.*` fields.
    pub normalized: BTreeMap<String, Value>,
    /// Raw payload retained for debugging.
    pub raw_payload: Value,
}

impl CanonicalEvent {
    /// Returns a normalized field as a string slice, if present and textual.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.normalized.get(key).and_then(Value::as_str)
    }

    /// Returns the resolved display message for the rendering widget.
    ///
    /// Falls back to an empty string when the provider delivered no message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.field_str(keys::MESSAGE).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_event() -> CanonicalEvent {
        let mut normalized = BTreeMap::new();
        normalized.insert(keys::CUSTOMER_NAME.to_string(), json!("Sarah"));
        normalized.insert(keys::MESSAGE.to_string(), json!("just bought a thing"));
        CanonicalEvent {
            event_id: EventId::from_native("shopstack", "1001"),
            site_id: SiteId::new(),
            campaign_id: CampaignId::new(),
            provider: "shopstack".to_string(),
            provider_event_type: "order.created".to_string(),
            event_type: "purchase".to_string(),
            timestamp: Utc::now(),
            normalized,
            raw_payload: json!({}),
        }
    }

    #[test]
    fn field_str_reads_normalized_map() {
        let event = make_event();
        assert_eq!(event.field_str(keys::CUSTOMER_NAME), Some("Sarah"));
        assert_eq!(event.field_str(keys::RATING), None);
    }

    #[test]
    fn message_falls_back_to_empty() {
        let mut event = make_event();
        event.normalized.remove(keys::MESSAGE);
        assert_eq!(event.message(), "");
    }
}
