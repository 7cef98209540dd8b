//! Dotted-path lookup over raw payload trees.
//!
//! Provider payloads arrive as arbitrary [`serde_json::Value`] trees.
//! Adapters (and the site-configured generic mapping adapter) extract
//! fields by walking dotted-path expressions like `customer.address.city`
//! or `line_items.0.title` — numeric segments index into arrays. A path
//! that fails to resolve at any segment yields `None`; callers substitute
//! their documented defaults instead of erroring.

use serde_json::Value;

/// Resolves a dotted path against a payload tree.
///
/// Returns `None` when any segment is absent, indexes out of bounds, or a
/// non-container value is traversed into.
#[must_use]
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a dotted path to a string.
///
/// Numbers and booleans are stringified; objects, arrays, and nulls are
/// treated as missing.
#[must_use]
pub fn lookup_str(payload: &Value, path: &str) -> Option<String> {
    match lookup(payload, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolves a dotted path to an `f64`, accepting numeric strings.
#[must_use]
pub fn lookup_f64(payload: &Value, path: &str) -> Option<f64> {
    match lookup(payload, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "customer": {
                "first_name": "Sarah",
                "address": { "city": "London" }
            },
            "line_items": [
                { "title": "Desk Lamp", "price": "24.99" },
                { "title": "Bulb" }
            ],
            "total": 31.5,
            "paid": true
        })
    }

    #[test]
    fn walks_nested_objects() {
        let p = payload();
        assert_eq!(
            lookup_str(&p, "customer.address.city").as_deref(),
            Some("London")
        );
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let p = payload();
        assert_eq!(
            lookup_str(&p, "line_items.0.title").as_deref(),
            Some("Desk Lamp")
        );
        assert_eq!(lookup_str(&p, "line_items.2.title"), None);
    }

    #[test]
    fn missing_segment_yields_none() {
        let p = payload();
        assert_eq!(lookup(&p, "customer.phone"), None);
        assert_eq!(lookup(&p, "customer.first_name.x"), None);
    }

    #[test]
    fn scalars_are_stringified() {
        let p = payload();
        assert_eq!(lookup_str(&p, "total").as_deref(), Some("31.5"));
        assert_eq!(lookup_str(&p, "paid").as_deref(), Some("true"));
    }

    #[test]
    fn numeric_strings_parse_as_f64() {
        let p = payload();
        assert_eq!(lookup_f64(&p, "line_items.0.price"), Some(24.99));
        assert_eq!(lookup_f64(&p, "total"), Some(31.5));
        assert_eq!(lookup_f64(&p, "customer.first_name"), None);
    }
}
