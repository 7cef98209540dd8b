//! Targeting and frequency filter.
//!
//! Decides, per campaign and visitor request, whether a notification may
//! show right now. Stages run cheapest-first and short-circuit on the
//! first failure: schedule, then audience, then frequency caps (the only
//! stage that touches storage). Evaluation is strictly read-only; exposure
//! counters move only when the selector actually shows a notification.

pub mod audience;
pub mod frequency;
pub mod schedule;

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Campaign, VisitorContext};
use crate::error::EngineError;
use crate::store::Store;

pub use audience::check_audience;
pub use schedule::check_schedule;

/// Why a campaign was skipped for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Today is not one of the campaign's active weekdays.
    OutsideActiveDays,
    /// The local time falls outside every active hour range.
    OutsideActiveHours,
    /// The page URL matched an exclude pattern.
    UrlExcluded,
    /// The page URL matched none of the include patterns.
    UrlNotIncluded,
    /// The visitor's country is excluded.
    CountryExcluded,
    /// The visitor's country matched none of the include codes.
    CountryNotIncluded,
    /// The visitor's device class is not enabled for this campaign.
    DeviceDisabled,
    /// The per-visitor exposure cap is already reached.
    UserCapReached,
    /// The per-session exposure cap is already reached.
    SessionCapReached,
    /// The cooldown since the last exposure has not elapsed.
    CooldownActive,
}

impl SkipReason {
    /// Stable reason code, used in logs and decision traces.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutsideActiveDays => "outside_active_days",
            Self::OutsideActiveHours => "outside_active_hours",
            Self::UrlExcluded => "url_excluded",
            Self::UrlNotIncluded => "url_not_included",
            Self::CountryExcluded => "country_excluded",
            Self::CountryNotIncluded => "country_not_included",
            Self::DeviceDisabled => "device_disabled",
            Self::UserCapReached => "user_cap_reached",
            Self::SessionCapReached => "session_cap_reached",
            Self::CooldownActive => "cooldown_active",
        }
    }
}

/// Outcome of evaluating one campaign for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// Whether the campaign may show.
    pub eligible: bool,
    /// The first failing check, if any.
    pub reason: Option<SkipReason>,
}

impl Eligibility {
    fn pass() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

/// Filter evaluating campaigns against a visitor request.
#[derive(Debug, Clone)]
pub struct TargetingFilter {
    store: Arc<dyn Store>,
}

impl TargetingFilter {
    /// Creates a filter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Evaluates one campaign against the request context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] when the frequency stage
    /// cannot read exposure counters.
    pub async fn is_eligible(
        &self,
        campaign: &Campaign,
        ctx: &VisitorContext,
    ) -> Result<Eligibility, EngineError> {
        if let Some(reason) = schedule::check_schedule(&campaign.schedule, ctx.now) {
            return Ok(Eligibility::skip(reason));
        }
        if let Some(reason) = audience::check_audience(&campaign.audience, ctx) {
            return Ok(Eligibility::skip(reason));
        }
        if let Some(reason) = frequency::check_frequency(&self.store, campaign, ctx).await? {
            return Ok(Eligibility::skip(reason));
        }
        Ok(Eligibility::pass())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{
        Audience, CampaignId, DeviceClass, FrequencyCap, Schedule, SiteId,
    };
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn filter() -> TargetingFilter {
        TargetingFilter::new(Arc::new(MemoryStore::new()))
    }

    fn campaign() -> Campaign {
        Campaign {
            campaign_id: CampaignId::new(),
            site_id: SiteId::new(),
            priority: 1,
            schedule: Schedule::always(),
            frequency_cap: FrequencyCap::default(),
            audience: Audience::default(),
            experiment_id: None,
        }
    }

    fn ctx() -> VisitorContext {
        VisitorContext {
            visitor_id: "v-1".to_string(),
            session_id: "s-1".to_string(),
            url: "https://shop.example/pricing".to_string(),
            country: Some("US".to_string()),
            device: DeviceClass::Desktop,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unrestricted_campaign_is_eligible() {
        let result = filter().is_eligible(&campaign(), &ctx()).await;
        assert_eq!(result.ok(), Some(Eligibility::pass()));
    }

    #[tokio::test]
    async fn schedule_failure_short_circuits_audience() {
        let mut c = campaign();
        c.schedule.active_days.clear();
        // The audience rule would also fail, but schedule runs first.
        c.audience.url_include = vec!["/checkout".to_string()];
        let result = filter().is_eligible(&c, &ctx()).await;
        assert_eq!(
            result.ok(),
            Some(Eligibility::skip(SkipReason::OutsideActiveDays))
        );
    }

    #[tokio::test]
    async fn audience_failure_short_circuits_frequency() {
        let mut c = campaign();
        c.audience.devices = vec![DeviceClass::Mobile];
        c.frequency_cap.per_user = 1;
        let result = filter().is_eligible(&c, &ctx()).await;
        assert_eq!(
            result.ok(),
            Some(Eligibility::skip(SkipReason::DeviceDisabled))
        );
    }

    #[tokio::test]
    async fn evaluation_never_touches_exposure_counters() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let filter = TargetingFilter::new(Arc::clone(&store));
        let c = campaign();
        let visitor_ctx = ctx();

        for _ in 0..5 {
            let _ = filter.is_eligible(&c, &visitor_ctx).await;
        }
        let exposure = store.exposure(c.campaign_id, &visitor_ctx.visitor_id).await;
        assert_eq!(exposure.ok().flatten().map(|e| e.count), None);
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(SkipReason::CooldownActive.as_str(), "cooldown_active");
        assert_eq!(SkipReason::UrlExcluded.as_str(), "url_excluded");
    }
}
