//! Campaigns and their targeting configuration.
//!
//! A campaign owns one targeting rule: a schedule (timezone, active days,
//! active hour ranges), audience restrictions (URL, country, device class),
//! and frequency caps. Empty lists mean "unrestricted" everywhere except
//! `active_days`, where an empty set means the campaign is never active.
//! Rules are validated at save time ([`Campaign::validate`]), not at
//! evaluation time.

use std::collections::BTreeSet;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::ids::{CampaignId, ExperimentId, SiteId};
use crate::error::EngineError;

/// Device classes a visitor request can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Desktop browsers.
    Desktop,
    /// Phones.
    Mobile,
    /// Tablets.
    Tablet,
}

/// One inclusive time-of-day range within an active day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    /// Range start (inclusive).
    pub start: NaiveTime,
    /// Range end (inclusive).
    pub end: NaiveTime,
}

impl HourRange {
    /// Returns `true` if `t` falls inside the range.
    #[must_use]
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// When a campaign is allowed to show, in its own timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// IANA timezone the schedule is evaluated in.
    pub timezone: Tz,
    /// Active weekdays, 0 = Sunday .. 6 = Saturday. Empty = never active.
    pub active_days: BTreeSet<u8>,
    /// Active hour ranges. Empty = all 24 hours on active days.
    pub active_hours: Vec<HourRange>,
}

impl Schedule {
    /// A schedule that is active around the clock, every day, in UTC.
    #[must_use]
    pub fn always() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            active_days: (0..=6).collect(),
            active_hours: Vec::new(),
        }
    }
}

/// How often a campaign may show to one visitor or session.
///
/// The default is fully uncapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyCap {
    /// Maximum lifetime exposures per visitor. 0 = uncapped.
    pub per_user: u32,
    /// Maximum exposures per session. 0 = uncapped.
    pub per_session: u32,
    /// Minimum seconds between two exposures to the same visitor.
    pub cooldown_seconds: u64,
}

/// Audience restriction rules. Exclude wins over include on conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    /// URL substrings the page must match (empty = any URL).
    #[serde(default)]
    pub url_include: Vec<String>,
    /// URL substrings that block the campaign.
    #[serde(default)]
    pub url_exclude: Vec<String>,
    /// ISO country codes the visitor must match (empty = any country).
    #[serde(default)]
    pub country_include: Vec<String>,
    /// ISO country codes that block the campaign.
    #[serde(default)]
    pub country_exclude: Vec<String>,
    /// Device classes the campaign may show on (empty = all devices).
    #[serde(default)]
    pub devices: Vec<DeviceClass>,
}

/// A notification campaign and its targeting rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identifier.
    pub campaign_id: CampaignId,
    /// Owning site.
    pub site_id: SiteId,
    /// Ranking priority against the site's other campaigns (higher first).
    pub priority: u32,
    /// Schedule rule.
    pub schedule: Schedule,
    /// Frequency caps.
    pub frequency_cap: FrequencyCap,
    /// Audience restrictions.
    pub audience: Audience,
    /// A/B test attached to this campaign's design, if any.
    pub experiment_id: Option<ExperimentId>,
}

impl Campaign {
    /// Validates the targeting rule at save time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] when a weekday is out of the
    /// 0–6 range or an hour range ends before it starts.
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(day) = self.schedule.active_days.iter().find(|d| **d > 6) {
            return Err(EngineError::InvalidRule(format!(
                "active day {day} out of range 0-6"
            )));
        }
        for range in &self.schedule.active_hours {
            if range.end < range.start {
                return Err(EngineError::InvalidRule(format!(
                    "hour range ends before it starts: {} > {}",
                    range.start, range.end
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::London;

    fn nt(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
    }

    fn make_campaign() -> Campaign {
        Campaign {
            campaign_id: CampaignId::new(),
            site_id: SiteId::new(),
            priority: 1,
            schedule: Schedule {
                timezone: London,
                active_days: (0..=6).collect(),
                active_hours: vec![HourRange {
                    start: nt(9, 0),
                    end: nt(17, 0),
                }],
            },
            frequency_cap: FrequencyCap {
                per_user: 5,
                per_session: 2,
                cooldown_seconds: 60,
            },
            audience: Audience::default(),
            experiment_id: None,
        }
    }

    #[test]
    fn valid_campaign_passes() {
        assert!(make_campaign().validate().is_ok());
    }

    #[test]
    fn day_out_of_range_is_rejected() {
        let mut c = make_campaign();
        c.schedule.active_days.insert(7);
        assert!(c.validate().is_err());
    }

    #[test]
    fn inverted_hour_range_is_rejected() {
        let mut c = make_campaign();
        c.schedule.active_hours = vec![HourRange {
            start: nt(18, 0),
            end: nt(9, 0),
        }];
        assert!(c.validate().is_err());
    }

    #[test]
    fn hour_range_is_inclusive_on_both_ends() {
        let r = HourRange {
            start: nt(9, 0),
            end: nt(17, 0),
        };
        assert!(r.contains(nt(9, 0)));
        assert!(r.contains(nt(16, 59)));
        assert!(r.contains(nt(17, 0)));
        assert!(!r.contains(nt(17, 1)));
    }
}
