//! Per-site, per-event-type notification weights.
//!
//! A [`NotificationWeight`] row governs how events of one type compete for
//! display on one site: `weight` ranks them against other types,
//! `max_per_queue` caps how many are concurrently eligible, and `ttl_days`
//! ages them out. Every event type a site can receive has exactly one
//! active row; [`NotificationWeight::default_for`] seeds it on first use.

use serde::{Deserialize, Serialize};

use super::ids::SiteId;

/// Weighting configuration for one `(site, event_type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationWeight {
    /// Site this row belongs to.
    pub site_id: SiteId,
    /// Canonical event type (e.g. `"purchase"`, `"review"`).
    pub event_type: String,
    /// Relative ranking score, >= 0. Not a probability.
    pub weight: u32,
    /// Cap on concurrently eligible events of this type.
    pub max_per_queue: u32,
    /// Age in days after which an event of this type is no longer eligible.
    pub ttl_days: u32,
}

/// Event types every site is seeded with, in default-weight order.
pub const DEFAULT_EVENT_TYPES: &[(&str, u32)] = &[
    ("purchase", 10),
    ("signup", 8),
    ("review", 6),
    ("submission", 5),
    ("booking", 5),
    ("manual", 3),
];

impl NotificationWeight {
    /// Returns the seeded default row for `(site_id, event_type)`.
    ///
    /// Unknown event types get a conservative low weight rather than being
    /// rejected, so a new adapter can ship before the defaults table learns
    /// about it.
    #[must_use]
    pub fn default_for(site_id: SiteId, event_type: &str) -> Self {
        let weight = DEFAULT_EVENT_TYPES
            .iter()
            .find(|(t, _)| *t == event_type)
            .map_or(3, |(_, w)| *w);
        Self {
            site_id,
            event_type: event_type.to_string(),
            weight,
            max_per_queue: 30,
            ttl_days: 30,
        }
    }

    /// Returns the full default weight set for a site.
    #[must_use]
    pub fn defaults_for_site(site_id: SiteId) -> Vec<Self> {
        DEFAULT_EVENT_TYPES
            .iter()
            .map(|(event_type, _)| Self::default_for(site_id, event_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_outranks_manual_by_default() {
        let site = SiteId::new();
        let purchase = NotificationWeight::default_for(site, "purchase");
        let manual = NotificationWeight::default_for(site, "manual");
        assert!(purchase.weight > manual.weight);
    }

    #[test]
    fn unknown_event_type_gets_low_default() {
        let w = NotificationWeight::default_for(SiteId::new(), "carrier_pigeon");
        assert_eq!(w.weight, 3);
        assert_eq!(w.ttl_days, 30);
    }

    #[test]
    fn defaults_cover_all_seeded_types() {
        let rows = NotificationWeight::defaults_for_site(SiteId::new());
        assert_eq!(rows.len(), DEFAULT_EVENT_TYPES.len());
    }
}
