//! In-memory store backed by `tokio::sync::RwLock` maps.
//!
//! Used by tests (a fresh instance per run, no shared module state) and by
//! deployments that run with persistence disabled. Each collection sits
//! behind its own lock; the atomic check-then-act operations take the
//! write lock for the full check-and-mutate, which serializes them per
//! collection — stricter than the per-key requirement, and harmless at
//! per-visitor request volumes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Store;
use crate::domain::{
    Campaign, CampaignId, CanonicalEvent, Connector, EventId, ExperimentId, ExperimentState,
    IdempotencyRecord, NotificationWeight, SiteId, VisitorExposure,
};
use crate::error::EngineError;

/// In-memory [`Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    idempotency: RwLock<HashMap<(String, String), IdempotencyRecord>>,
    events: RwLock<Vec<CanonicalEvent>>,
    weights: RwLock<HashMap<(SiteId, String), NotificationWeight>>,
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
    connectors: RwLock<HashMap<String, Connector>>,
    cursors: RwLock<HashMap<(SiteId, String), String>>,
    exposures: RwLock<HashMap<(CampaignId, String), VisitorExposure>>,
    campaign_views: RwLock<HashMap<CampaignId, u64>>,
    experiments: RwLock<HashMap<ExperimentId, ExperimentState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_idempotency_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<bool, EngineError> {
        let mut map = self.idempotency.write().await;
        let key = (record.webhook_type.clone(), record.idempotency_key.clone());
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, record);
        Ok(true)
    }

    async fn prune_idempotency(&self, before: DateTime<Utc>) -> Result<u64, EngineError> {
        let mut map = self.idempotency.write().await;
        let before_len = map.len();
        map.retain(|_, record| record.first_seen_at >= before);
        Ok((before_len - map.len()) as u64)
    }

    async fn insert_event(&self, event: CanonicalEvent) -> Result<(), EngineError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn remove_event(&self, site_id: SiteId, event_id: &EventId) -> Result<(), EngineError> {
        self.events
            .write()
            .await
            .retain(|e| !(e.site_id == site_id && e.event_id == *event_id));
        Ok(())
    }

    async fn events_for_type(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Vec<CanonicalEvent>, EngineError> {
        let mut events: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.site_id == site_id && e.event_type == event_type)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn events_for_site(&self, site_id: SiteId) -> Result<Vec<CanonicalEvent>, EngineError> {
        let mut events: Vec<_> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.site_id == site_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn weight(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Option<NotificationWeight>, EngineError> {
        Ok(self
            .weights
            .read()
            .await
            .get(&(site_id, event_type.to_string()))
            .cloned())
    }

    async fn upsert_weight(&self, weight: NotificationWeight) -> Result<(), EngineError> {
        self.weights
            .write()
            .await
            .insert((weight.site_id, weight.event_type.clone()), weight);
        Ok(())
    }

    async fn weights_for_site(
        &self,
        site_id: SiteId,
    ) -> Result<Vec<NotificationWeight>, EngineError> {
        let mut rows: Vec<_> = self
            .weights
            .read()
            .await
            .values()
            .filter(|w| w.site_id == site_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.event_type.cmp(&b.event_type));
        Ok(rows)
    }

    async fn replace_weights(
        &self,
        site_id: SiteId,
        weights: Vec<NotificationWeight>,
    ) -> Result<(), EngineError> {
        let mut map = self.weights.write().await;
        map.retain(|(sid, _), _| *sid != site_id);
        for weight in weights {
            map.insert((weight.site_id, weight.event_type.clone()), weight);
        }
        Ok(())
    }

    async fn campaign(&self, campaign_id: CampaignId) -> Result<Option<Campaign>, EngineError> {
        Ok(self.campaigns.read().await.get(&campaign_id).cloned())
    }

    async fn campaigns_for_site(&self, site_id: SiteId) -> Result<Vec<Campaign>, EngineError> {
        let mut rows: Vec<_> = self
            .campaigns
            .read()
            .await
            .values()
            .filter(|c| c.site_id == site_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rows)
    }

    async fn upsert_campaign(&self, campaign: Campaign) -> Result<(), EngineError> {
        self.campaigns
            .write()
            .await
            .insert(campaign.campaign_id, campaign);
        Ok(())
    }

    async fn connector_by_token(&self, token: &str) -> Result<Option<Connector>, EngineError> {
        Ok(self.connectors.read().await.get(token).cloned())
    }

    async fn connector_for_provider(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<Connector>, EngineError> {
        Ok(self
            .connectors
            .read()
            .await
            .values()
            .find(|c| c.site_id == site_id && c.provider == provider)
            .cloned())
    }

    async fn upsert_connector(&self, connector: Connector) -> Result<(), EngineError> {
        self.connectors
            .write()
            .await
            .insert(connector.token.clone(), connector);
        Ok(())
    }

    async fn poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<String>, EngineError> {
        Ok(self
            .cursors
            .read()
            .await
            .get(&(site_id, provider.to_string()))
            .cloned())
    }

    async fn set_poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
        cursor: &str,
    ) -> Result<(), EngineError> {
        self.cursors
            .write()
            .await
            .insert((site_id, provider.to_string()), cursor.to_string());
        Ok(())
    }

    async fn exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
    ) -> Result<Option<VisitorExposure>, EngineError> {
        Ok(self
            .exposures
            .read()
            .await
            .get(&(campaign_id, subject.to_string()))
            .cloned())
    }

    async fn record_exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
        at: DateTime<Utc>,
    ) -> Result<VisitorExposure, EngineError> {
        let mut map = self.exposures.write().await;
        let entry = map
            .entry((campaign_id, subject.to_string()))
            .or_insert_with(|| VisitorExposure {
                campaign_id,
                subject: subject.to_string(),
                count: 0,
                last_shown_at: at,
            });
        entry.count = entry.count.saturating_add(1);
        entry.last_shown_at = entry.last_shown_at.max(at);
        Ok(entry.clone())
    }

    async fn increment_campaign_views(&self, campaign_id: CampaignId) -> Result<u64, EngineError> {
        let mut map = self.campaign_views.write().await;
        let counter = map.entry(campaign_id).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }

    async fn experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Option<ExperimentState>, EngineError> {
        Ok(self.experiments.read().await.get(&experiment_id).cloned())
    }

    async fn upsert_experiment(&self, state: ExperimentState) -> Result<(), EngineError> {
        self.experiments
            .write()
            .await
            .insert(state.experiment_id, state);
        Ok(())
    }

    async fn add_variant_view(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        let mut map = self.experiments.write().await;
        let state = map
            .get_mut(&experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id.as_uuid()))?;
        if let Some(variant) = state.variants.iter_mut().find(|v| v.id == variant_id) {
            variant.views = variant.views.saturating_add(1);
        }
        Ok(())
    }

    async fn add_variant_click(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        let mut map = self.experiments.write().await;
        let state = map
            .get_mut(&experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id.as_uuid()))?;
        if let Some(variant) = state.variants.iter_mut().find(|v| v.id == variant_id) {
            variant.clicks = variant.clicks.saturating_add(1);
        }
        Ok(())
    }

    async fn pin_winner(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut map = self.experiments.write().await;
        let state = map
            .get_mut(&experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id.as_uuid()))?;
        if state.winner_variant_id.is_some() {
            return Ok(false);
        }
        state.winner_variant_id = Some(variant_id.to_string());
        state.winner_declared_at = Some(at);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(key: &str) -> IdempotencyRecord {
        IdempotencyRecord {
            webhook_type: "shopstack".to_string(),
            idempotency_key: key.to_string(),
            payload_snapshot: json!({}),
            first_seen_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn idempotency_insert_is_first_writer_wins() {
        let store = MemoryStore::new();
        let first = store.insert_idempotency_if_absent(record("k1")).await;
        let second = store.insert_idempotency_if_absent(record("k1")).await;
        assert_eq!(first.ok(), Some(true));
        assert_eq!(second.ok(), Some(false));
    }

    #[tokio::test]
    async fn concurrent_idempotency_inserts_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let a = Arc::clone(&store);
        let b = Arc::clone(&store);
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.insert_idempotency_if_absent(record("k2")).await }),
            tokio::spawn(async move { b.insert_idempotency_if_absent(record("k2")).await }),
        );
        let (Ok(Ok(ra)), Ok(Ok(rb))) = (ra, rb) else {
            panic!("both tasks should complete");
        };
        assert!(ra ^ rb, "exactly one insert must win");
    }

    #[tokio::test]
    async fn prune_removes_only_old_records() {
        let store = MemoryStore::new();
        let mut old = record("old");
        old.first_seen_at = Utc::now() - chrono::Duration::hours(72);
        let _ = store.insert_idempotency_if_absent(old).await;
        let _ = store.insert_idempotency_if_absent(record("fresh")).await;

        let pruned = store
            .prune_idempotency(Utc::now() - chrono::Duration::hours(48))
            .await;
        assert_eq!(pruned.ok(), Some(1));

        // The fresh key is still known.
        let replay = store.insert_idempotency_if_absent(record("fresh")).await;
        assert_eq!(replay.ok(), Some(false));
    }

    #[tokio::test]
    async fn record_exposure_increments_and_moves_forward() {
        let store = MemoryStore::new();
        let campaign = CampaignId::new();
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(30);

        let first = store.record_exposure(campaign, "v-1", t1).await;
        let second = store.record_exposure(campaign, "v-1", t2).await;
        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("exposure recording failed");
        };
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert_eq!(second.last_shown_at, t2);
    }

    #[tokio::test]
    async fn pin_winner_is_set_once() {
        let store = MemoryStore::new();
        let id = ExperimentId::new();
        let state = ExperimentState::new(id, &[("Control", true), ("New", false)]);
        let _ = store.upsert_experiment(state).await;

        let first = store.pin_winner(id, "New", Utc::now()).await;
        let second = store.pin_winner(id, "Control", Utc::now()).await;
        assert_eq!(first.ok(), Some(true));
        assert_eq!(second.ok(), Some(false));

        let stored = store.experiment(id).await.ok().flatten();
        assert_eq!(
            stored.and_then(|s| s.winner_variant_id),
            Some("New".to_string())
        );
    }
}
