//! Frequency cap evaluation against stored exposure counters.
//!
//! Caps are read-only here: nothing increments until the selector actually
//! shows a notification, so campaigns that fail later stages never consume
//! a visitor's budget. A cap value of `0` means uncapped.

use std::sync::Arc;

use super::SkipReason;
use crate::domain::{Campaign, FrequencyCap, VisitorContext};
use crate::error::EngineError;
use crate::store::Store;

/// Checks the visitor's exposure history against the campaign's caps.
///
/// Evaluation order: per-user cap, per-session cap, cooldown. The cooldown
/// runs from the most recent exposure for this visitor.
///
/// # Errors
///
/// Returns [`EngineError::StorageError`] on backend failure.
pub async fn check_frequency(
    store: &Arc<dyn Store>,
    campaign: &Campaign,
    ctx: &VisitorContext,
) -> Result<Option<SkipReason>, EngineError> {
    let cap = &campaign.frequency_cap;
    if is_uncapped(cap) {
        return Ok(None);
    }

    let user = store.exposure(campaign.campaign_id, &ctx.visitor_id).await?;
    if cap.per_user > 0
        && user.as_ref().is_some_and(|e| e.count >= cap.per_user)
    {
        return Ok(Some(SkipReason::UserCapReached));
    }

    if cap.per_session > 0 {
        let session = store.exposure(campaign.campaign_id, &ctx.session_id).await?;
        if session.is_some_and(|e| e.count >= cap.per_session) {
            return Ok(Some(SkipReason::SessionCapReached));
        }
    }

    if cap.cooldown_seconds > 0
        && let Some(exposure) = user
    {
        let elapsed = (ctx.now - exposure.last_shown_at).num_seconds();
        let cooldown = i64::try_from(cap.cooldown_seconds).unwrap_or(i64::MAX);
        if elapsed < cooldown {
            return Ok(Some(SkipReason::CooldownActive));
        }
    }

    Ok(None)
}

fn is_uncapped(cap: &FrequencyCap) -> bool {
    cap.per_user == 0 && cap.per_session == 0 && cap.cooldown_seconds == 0
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Audience, CampaignId, DeviceClass, Schedule, SiteId};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn campaign(cap: FrequencyCap) -> Campaign {
        Campaign {
            campaign_id: CampaignId::new(),
            site_id: SiteId::new(),
            priority: 0,
            schedule: Schedule::always(),
            frequency_cap: cap,
            audience: Audience::default(),
            experiment_id: None,
        }
    }

    fn ctx() -> VisitorContext {
        VisitorContext {
            visitor_id: "v-1".to_string(),
            session_id: "s-1".to_string(),
            url: "https://shop.example/".to_string(),
            country: None,
            device: DeviceClass::Desktop,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn zero_caps_mean_uncapped() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let campaign = campaign(FrequencyCap::default());
        let ctx = ctx();
        let _ = store
            .record_exposure(campaign.campaign_id, &ctx.visitor_id, ctx.now)
            .await;
        let result = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(result.ok(), Some(None));
    }

    #[tokio::test]
    async fn user_cap_blocks_at_the_limit() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let campaign = campaign(FrequencyCap {
            per_user: 2,
            per_session: 0,
            cooldown_seconds: 0,
        });
        let ctx = ctx();

        for _ in 0..2 {
            let _ = store
                .record_exposure(campaign.campaign_id, &ctx.visitor_id, ctx.now)
                .await;
        }
        let result = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(result.ok(), Some(Some(SkipReason::UserCapReached)));
    }

    #[tokio::test]
    async fn session_cap_is_keyed_by_session_id() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let campaign = campaign(FrequencyCap {
            per_user: 0,
            per_session: 1,
            cooldown_seconds: 0,
        });
        let ctx = ctx();

        // Exposure under a different session does not count.
        let _ = store
            .record_exposure(campaign.campaign_id, "s-other", ctx.now)
            .await;
        let clear = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(clear.ok(), Some(None));

        let _ = store
            .record_exposure(campaign.campaign_id, &ctx.session_id, ctx.now)
            .await;
        let blocked = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(blocked.ok(), Some(Some(SkipReason::SessionCapReached)));
    }

    #[tokio::test]
    async fn oversized_cooldown_still_blocks() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let campaign = campaign(FrequencyCap {
            per_user: 0,
            per_session: 0,
            cooldown_seconds: u64::MAX,
        });
        let ctx = ctx();

        let _ = store
            .record_exposure(campaign.campaign_id, &ctx.visitor_id, ctx.now)
            .await;
        let result = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(result.ok(), Some(Some(SkipReason::CooldownActive)));
    }

    #[tokio::test]
    async fn cooldown_blocks_then_expires() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let campaign = campaign(FrequencyCap {
            per_user: 0,
            per_session: 0,
            cooldown_seconds: 600,
        });
        let mut ctx = ctx();

        let shown_at = ctx.now - Duration::seconds(30);
        let _ = store
            .record_exposure(campaign.campaign_id, &ctx.visitor_id, shown_at)
            .await;
        let blocked = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(blocked.ok(), Some(Some(SkipReason::CooldownActive)));

        ctx.now = shown_at + Duration::seconds(601);
        let clear = check_frequency(&store, &campaign, &ctx).await;
        assert_eq!(clear.ok(), Some(None));
    }
}
