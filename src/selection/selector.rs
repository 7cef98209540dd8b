//! Picks the single notification to show for one visitor request.
//!
//! Ranking is campaign priority first, then event weight, then recency.
//! The queue already returns events weight-descending with recency as the
//! tiebreak, so a stable sort by priority on top preserves that order
//! within each priority band.
//!
//! Side effects (exposure counters, view counter, the
//! `notification_selected` event) apply to the winner only. Campaigns that
//! were considered and skipped leave no trace beyond a debug log line.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Campaign, CanonicalEvent, EngineEvent, EventBus, SiteId, VisitorContext};
use crate::error::EngineError;
use crate::pipeline::WeightedQueue;
use crate::store::Store;
use crate::targeting::TargetingFilter;

/// The winning notification for one request.
#[derive(Debug, Clone)]
pub struct SelectedNotification {
    /// Campaign the notification belongs to.
    pub campaign: Campaign,
    /// The event chosen for display.
    pub event: CanonicalEvent,
}

/// Selector combining the queue, the targeting filter, and the exposure
/// bookkeeping.
#[derive(Debug)]
pub struct Selector {
    store: Arc<dyn Store>,
    queue: Arc<WeightedQueue>,
    filter: TargetingFilter,
    event_bus: EventBus,
}

impl Selector {
    /// Creates a selector over the given store and queue.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<WeightedQueue>, event_bus: EventBus) -> Self {
        let filter = TargetingFilter::new(Arc::clone(&store));
        Self {
            store,
            queue,
            filter,
            event_bus,
        }
    }

    /// Selects the next notification for a visitor, or `None` when no
    /// campaign and event pair is eligible.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn select_next(
        &self,
        site_id: SiteId,
        ctx: &VisitorContext,
    ) -> Result<Option<SelectedNotification>, EngineError> {
        let campaigns = self.store.campaigns_for_site(site_id).await?;
        let mut eligible: HashMap<_, Campaign> = HashMap::new();
        for campaign in campaigns {
            let verdict = self.filter.is_eligible(&campaign, ctx).await?;
            if verdict.eligible {
                eligible.insert(campaign.campaign_id, campaign);
            } else if let Some(reason) = verdict.reason {
                tracing::debug!(
                    campaign_id = %campaign.campaign_id,
                    visitor_id = %ctx.visitor_id,
                    reason = reason.as_str(),
                    "campaign skipped"
                );
            }
        }
        if eligible.is_empty() {
            return Ok(None);
        }

        let mut candidates: Vec<_> = self
            .queue
            .eligible(site_id, ctx.now)
            .await?
            .into_iter()
            .filter(|event| eligible.contains_key(&event.campaign_id))
            .collect();
        candidates.sort_by_key(|event| {
            std::cmp::Reverse(eligible.get(&event.campaign_id).map_or(0, |c| c.priority))
        });

        let Some(event) = candidates.into_iter().next() else {
            return Ok(None);
        };
        let Some(campaign) = eligible.remove(&event.campaign_id) else {
            return Ok(None);
        };

        self.store
            .record_exposure(campaign.campaign_id, &ctx.visitor_id, ctx.now)
            .await?;
        self.store
            .record_exposure(campaign.campaign_id, &ctx.session_id, ctx.now)
            .await?;
        self.store
            .increment_campaign_views(campaign.campaign_id)
            .await?;
        self.event_bus.publish(EngineEvent::NotificationSelected {
            site_id,
            campaign_id: campaign.campaign_id,
            event_id: event.event_id.clone(),
            visitor_id: ctx.visitor_id.clone(),
            timestamp: ctx.now,
        });

        tracing::info!(
            site_id = %site_id,
            campaign_id = %campaign.campaign_id,
            event_id = %event.event_id,
            "notification selected"
        );
        Ok(Some(SelectedNotification { campaign, event }))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::keys;
    use crate::domain::{
        Audience, CampaignId, DeviceClass, EventId, FrequencyCap, Schedule,
    };
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_selector() -> (Arc<dyn Store>, Selector) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let queue = Arc::new(WeightedQueue::new(Arc::clone(&store)));
        let selector = Selector::new(Arc::clone(&store), queue, EventBus::new(16));
        (store, selector)
    }

    fn make_campaign(site_id: SiteId, priority: u32) -> Campaign {
        Campaign {
            campaign_id: CampaignId::new(),
            site_id,
            priority,
            schedule: Schedule::always(),
            frequency_cap: FrequencyCap::default(),
            audience: Audience::default(),
            experiment_id: None,
        }
    }

    fn make_event(
        site_id: SiteId,
        campaign_id: CampaignId,
        event_type: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> CanonicalEvent {
        let mut normalized = BTreeMap::new();
        normalized.insert(keys::CUSTOMER_NAME.to_string(), json!("Sarah"));
        CanonicalEvent {
            event_id: EventId::from_native("shopstack", id),
            site_id,
            campaign_id,
            provider: "shopstack".to_string(),
            provider_event_type: "order.created".to_string(),
            event_type: event_type.to_string(),
            timestamp: at,
            normalized,
            raw_payload: json!({}),
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
    async fn empty_site_selects_nothing() {
        let (_, selector) = make_selector();
        let result = selector.select_next(SiteId::new(), &ctx()).await;
        let Ok(result) = result else {
            panic!("select failed");
        };
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn priority_outranks_event_weight() {
        let (store, selector) = make_selector();
        let site = SiteId::new();
        let high = make_campaign(site, 10);
        let low = make_campaign(site, 1);
        let _ = store.upsert_campaign(high.clone()).await;
        let _ = store.upsert_campaign(low.clone()).await;

        let now = Utc::now();
        // The low-priority campaign holds the heavier event type.
        let _ = store
            .insert_event(make_event(site, low.campaign_id, "purchase", "p1", now))
            .await;
        let _ = store
            .insert_event(make_event(site, high.campaign_id, "manual", "m1", now))
            .await;

        let result = selector.select_next(site, &ctx()).await;
        let Ok(Some(selected)) = result else {
            panic!("expected a selection");
        };
        assert_eq!(selected.campaign.campaign_id, high.campaign_id);
        assert_eq!(selected.event.event_id.as_str(), "shopstack:m1");
    }

    #[tokio::test]
    async fn weight_breaks_ties_within_a_priority_band() {
        let (store, selector) = make_selector();
        let site = SiteId::new();
        let campaign = make_campaign(site, 5);
        let _ = store.upsert_campaign(campaign.clone()).await;

        let now = Utc::now();
        let _ = store
            .insert_event(make_event(
                site,
                campaign.campaign_id,
                "manual",
                "m1",
                now,
            ))
            .await;
        let _ = store
            .insert_event(make_event(
                site,
                campaign.campaign_id,
                "purchase",
                "p1",
                now - Duration::seconds(60),
            ))
            .await;

        let result = selector.select_next(site, &ctx()).await;
        let Ok(Some(selected)) = result else {
            panic!("expected a selection");
        };
        assert_eq!(selected.event.event_id.as_str(), "shopstack:p1");
    }

    #[tokio::test]
    async fn winner_side_effects_only() {
        let (store, selector) = make_selector();
        let site = SiteId::new();
        let winner = make_campaign(site, 10);
        let loser = make_campaign(site, 1);
        let _ = store.upsert_campaign(winner.clone()).await;
        let _ = store.upsert_campaign(loser.clone()).await;

        let now = Utc::now();
        let _ = store
            .insert_event(make_event(site, winner.campaign_id, "purchase", "w1", now))
            .await;
        let _ = store
            .insert_event(make_event(site, loser.campaign_id, "purchase", "l1", now))
            .await;

        let visitor_ctx = ctx();
        let _ = selector.select_next(site, &visitor_ctx).await;

        let user = store.exposure(winner.campaign_id, "v-1").await;
        let session = store.exposure(winner.campaign_id, "s-1").await;
        assert_eq!(user.ok().flatten().map(|e| e.count), Some(1));
        assert_eq!(session.ok().flatten().map(|e| e.count), Some(1));

        let untouched = store.exposure(loser.campaign_id, "v-1").await;
        assert_eq!(untouched.ok().flatten().map(|e| e.count), None);
    }

    #[tokio::test]
    async fn frequency_cap_excludes_a_campaign_after_exposure() {
        let (store, selector) = make_selector();
        let site = SiteId::new();
        let mut campaign = make_campaign(site, 5);
        campaign.frequency_cap.per_session = 1;
        let _ = store.upsert_campaign(campaign.clone()).await;
        let _ = store
            .insert_event(make_event(
                site,
                campaign.campaign_id,
                "purchase",
                "p1",
                Utc::now(),
            ))
            .await;

        let visitor_ctx = ctx();
        let first = selector.select_next(site, &visitor_ctx).await;
        let Ok(Some(_)) = first else {
            panic!("expected first selection");
        };

        let second = selector.select_next(site, &visitor_ctx).await;
        let Ok(second) = second else {
            panic!("second select failed");
        };
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn selection_publishes_an_event() {
        let (store, selector) = make_selector();
        let site = SiteId::new();
        let campaign = make_campaign(site, 1);
        let _ = store.upsert_campaign(campaign.clone()).await;
        let _ = store
            .insert_event(make_event(
                site,
                campaign.campaign_id,
                "purchase",
                "p1",
                Utc::now(),
            ))
            .await;

        let mut rx = selector.event_bus.subscribe();
        let _ = selector.select_next(site, &ctx()).await;

        let published = rx.recv().await;
        let Ok(published) = published else {
            panic!("expected a published event");
        };
        assert_eq!(published.event_type_str(), "notification_selected");
    }
}
