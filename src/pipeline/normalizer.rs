//! Canonical normalization of raw provider events.
//!
//! [`normalize`] is pure and total: every [`RawProviderEvent`] produces a
//! [`CanonicalEvent`], never an error. Malformed optional fields degrade to
//! defaults, and the same raw event always yields the same normalized map.
//!
//! Each known provider has a mapping table from payload paths to canonical
//! keys with a coercion rule. Unknown providers get only the generic
//! mapping, which copies the adapter-extracted `user_name`,
//! `user_location`, and `message` fields verbatim into `template.*` keys.

use std::collections::BTreeMap;

use serde_json::{Number, Value, json};
use sha2::{Digest, Sha256};

use crate::domain::event::keys;
use crate::domain::{CampaignId, CanonicalEvent, EventId, RawProviderEvent, SiteId};
use crate::providers::path;

/// How a mapped payload value is coerced into its canonical slot.
#[derive(Debug, Clone, Copy)]
enum Coerce {
    /// Copy as a string.
    Text,
    /// Copy as a string, uppercased (currency codes).
    Upper,
    /// Parse as a float; unparseable values degrade to 0.
    Number,
    /// Parse as a float and divide by 100 (minor-unit amounts).
    Cents,
    /// Parse as an integer rating and clamp to 1–5 with a logged warning.
    Rating,
}

/// Per-provider mapping tables: payload path → canonical key + coercion.
const SHOPSTACK_TABLE: &[(&str, &str, Coerce)] = &[
    ("line_items.0.title", keys::PRODUCT_NAME, Coerce::Text),
    ("total_price", keys::AMOUNT, Coerce::Number),
    ("currency", keys::CURRENCY, Coerce::Upper),
    ("financial_status", keys::STATUS, Coerce::Text),
];

const PAYWAVE_TABLE: &[(&str, &str, Coerce)] = &[
    ("data.object.amount", keys::AMOUNT, Coerce::Cents),
    ("data.object.currency", keys::CURRENCY, Coerce::Upper),
    ("data.object.description", keys::PRODUCT_NAME, Coerce::Text),
    ("data.object.status", keys::STATUS, Coerce::Text),
];

const RATEWISE_TABLE: &[(&str, &str, Coerce)] = &[
    ("rating", keys::RATING, Coerce::Rating),
    ("product", keys::PRODUCT_NAME, Coerce::Text),
];

fn table_for(provider: &str) -> &'static [(&'static str, &'static str, Coerce)] {
    match provider {
        "shopstack" => SHOPSTACK_TABLE,
        "paywave" => PAYWAVE_TABLE,
        "ratewise" => RATEWISE_TABLE,
        _ => &[],
    }
}

/// Normalizes a raw provider event into a canonical event.
///
/// `canonical_type` is the event type the owning adapter maps to
/// (`"purchase"`, `"review"`, ...), used downstream for weighting.
#[must_use]
pub fn normalize(
    raw: &RawProviderEvent,
    site_id: SiteId,
    campaign_id: CampaignId,
    canonical_type: &str,
) -> CanonicalEvent {
    let mut normalized = BTreeMap::new();

    // Generic mapping: adapter-extracted fields copied verbatim.
    let name = raw
        .user_name
        .clone()
        .unwrap_or_else(|| crate::providers::ANONYMOUS_NAME.to_string());
    normalized.insert(keys::CUSTOMER_NAME.to_string(), Value::String(name));
    if let Some(location) = &raw.user_location {
        normalized.insert(keys::CUSTOMER_LOCATION.to_string(), json!(location));
    }
    normalized.insert(
        keys::MESSAGE.to_string(),
        Value::String(raw.message.clone().unwrap_or_default()),
    );
    normalized.insert(keys::SOURCE.to_string(), json!(raw.provider));
    if let Some(native_id) = &raw.native_id {
        normalized.insert(keys::NATIVE_ID.to_string(), json!(native_id));
    }

    // Provider-specific mapping table.
    for (payload_path, canonical_key, coerce) in table_for(&raw.provider) {
        if let Some(value) = coerce_value(&raw.payload, payload_path, *coerce, &raw.provider) {
            normalized.insert((*canonical_key).to_string(), value);
        }
    }

    // The mapped adapter has already placed canonical keys in its payload.
    if raw.provider == "mapped"
        && let Some(object) = raw.payload.as_object()
    {
        for (key, value) in object {
            if key.starts_with("template.") || key.starts_with("meta.") {
                normalized.insert(key.clone(), value.clone());
            }
        }
    }

    let event_id = match &raw.native_id {
        Some(native_id) => EventId::from_native(&raw.provider, native_id),
        None => EventId::from_hash(&raw.provider, &payload_hash(&raw.payload)),
    };

    CanonicalEvent {
        event_id,
        site_id,
        campaign_id,
        provider: raw.provider.clone(),
        provider_event_type: raw.provider_event_type.clone(),
        event_type: canonical_type.to_string(),
        timestamp: raw.received_at,
        normalized,
        raw_payload: raw.payload.clone(),
    }
}

/// Applies one coercion rule; `None` means "leave the slot unset".
fn coerce_value(payload: &Value, payload_path: &str, coerce: Coerce, provider: &str) -> Option<Value> {
    match coerce {
        Coerce::Text => path::lookup_str(payload, payload_path).map(Value::String),
        Coerce::Upper => {
            path::lookup_str(payload, payload_path).map(|s| Value::String(s.to_uppercase()))
        }
        Coerce::Number => {
            let n = path::lookup_f64(payload, payload_path)?;
            Number::from_f64(n).map(Value::Number)
        }
        Coerce::Cents => {
            let n = path::lookup_f64(payload, payload_path)?;
            Number::from_f64(n / 100.0).map(Value::Number)
        }
        Coerce::Rating => {
            #[allow(clippy::cast_possible_truncation)]
            let rating = path::lookup_f64(payload, payload_path)? as i64;
            let clamped = rating.clamp(1, 5);
            if clamped != rating {
                tracing::warn!(provider, rating, clamped, "rating outside 1-5, clamped");
            }
            Some(json!(clamped))
        }
    }
}

/// Stable 16-hex-char hash of a payload, used when no native id exists.
///
/// `serde_json::Map` keeps keys sorted, so serialization (and therefore the
/// hash) is deterministic for equal payloads.
fn payload_hash(payload: &Value) -> String {
    let serialized = serde_json::to_string(payload).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(16);
    hash
}
