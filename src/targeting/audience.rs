//! Audience rule evaluation: URL, country, and device class.
//!
//! Include lists are "must match one"; exclude lists are "must match
//! none"; exclude wins when both match. Empty lists are unrestricted.
//! URL rules are case-sensitive substring matches against the page URL;
//! country rules compare ISO codes case-insensitively.

use super::SkipReason;
use crate::domain::{Audience, VisitorContext};

/// Checks the visitor context against the campaign's audience rules.
#[must_use]
pub fn check_audience(audience: &Audience, ctx: &VisitorContext) -> Option<SkipReason> {
    // Exclude takes precedence over include on conflict.
    if audience.url_exclude.iter().any(|p| ctx.url.contains(p.as_str())) {
        return Some(SkipReason::UrlExcluded);
    }
    if !audience.url_include.is_empty()
        && !audience.url_include.iter().any(|p| ctx.url.contains(p.as_str()))
    {
        return Some(SkipReason::UrlNotIncluded);
    }

    let country = ctx.country.as_deref().unwrap_or("");
    let matches = |code: &String| code.eq_ignore_ascii_case(country);
    if audience.country_exclude.iter().any(matches) {
        return Some(SkipReason::CountryExcluded);
    }
    if !audience.country_include.is_empty() && !audience.country_include.iter().any(matches) {
        return Some(SkipReason::CountryNotIncluded);
    }

    if !audience.devices.is_empty() && !audience.devices.contains(&ctx.device) {
        return Some(SkipReason::DeviceDisabled);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceClass;
    use chrono::Utc;

    fn ctx(url: &str, country: Option<&str>, device: DeviceClass) -> VisitorContext {
        VisitorContext {
            visitor_id: "v-1".to_string(),
            session_id: "s-1".to_string(),
            url: url.to_string(),
            country: country.map(str::to_string),
            device,
            now: Utc::now(),
        }
    }

    #[test]
    fn empty_rules_are_unrestricted() {
        let audience = Audience::default();
        let c = ctx("https://shop.example/pricing", Some("GB"), DeviceClass::Mobile);
        assert_eq!(check_audience(&audience, &c), None);
    }

    #[test]
    fn exclude_wins_over_include_on_conflict() {
        let audience = Audience {
            url_include: vec!["/pricing".to_string()],
            url_exclude: vec!["/pricing/internal".to_string()],
            ..Audience::default()
        };
        let c = ctx(
            "https://shop.example/pricing/internal",
            None,
            DeviceClass::Desktop,
        );
        assert_eq!(check_audience(&audience, &c), Some(SkipReason::UrlExcluded));
    }

    #[test]
    fn url_include_must_match_something() {
        let audience = Audience {
            url_include: vec!["/pricing".to_string()],
            ..Audience::default()
        };
        let c = ctx("https://shop.example/blog", None, DeviceClass::Desktop);
        assert_eq!(check_audience(&audience, &c), Some(SkipReason::UrlNotIncluded));
    }

    #[test]
    fn country_rules_are_case_insensitive() {
        let audience = Audience {
            country_exclude: vec!["gb".to_string()],
            ..Audience::default()
        };
        let c = ctx("https://shop.example/", Some("GB"), DeviceClass::Desktop);
        assert_eq!(check_audience(&audience, &c), Some(SkipReason::CountryExcluded));
    }

    #[test]
    fn missing_country_fails_an_include_rule() {
        let audience = Audience {
            country_include: vec!["US".to_string()],
            ..Audience::default()
        };
        let c = ctx("https://shop.example/", None, DeviceClass::Desktop);
        assert_eq!(
            check_audience(&audience, &c),
            Some(SkipReason::CountryNotIncluded)
        );
    }

    #[test]
    fn device_list_restricts_device_classes() {
        let audience = Audience {
            devices: vec![DeviceClass::Desktop],
            ..Audience::default()
        };
        let c = ctx("https://shop.example/", None, DeviceClass::Mobile);
        assert_eq!(check_audience(&audience, &c), Some(SkipReason::DeviceDisabled));
    }
}
