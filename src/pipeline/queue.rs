//! Weighting and queue management for eligible events.
//!
//! Per `(site, event_type)` the [`crate::domain::NotificationWeight`] row
//! governs admission: at `max_per_queue` the oldest eligible event of that
//! type is evicted before the new one is admitted (FIFO within a type).
//! TTL eviction is lazy — expired events are filtered at read time, never
//! swept in the background — so the component is stateless apart from the
//! stored events themselves.
//!
//! Weight values are relative ranking scores consumed by the selector, not
//! probabilities.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{CanonicalEvent, EventId, NotificationWeight, SiteId};
use crate::error::EngineError;
use crate::store::Store;

/// Outcome of one admission.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Whether the event entered the queue.
    pub admitted: bool,
    /// Events evicted to make room, oldest first.
    pub evicted: Vec<EventId>,
}

/// Queue manager over the storage interface.
///
/// # Concurrency
///
/// Admissions for the same `(site, event_type)` are serialized behind a
/// per-key async mutex so `max_per_queue` stays exact under concurrent
/// deliveries; different keys proceed in parallel.
#[derive(Debug)]
pub struct WeightedQueue {
    store: Arc<dyn Store>,
    admit_locks: RwLock<HashMap<(SiteId, String), Arc<Mutex<()>>>>,
}

impl WeightedQueue {
    /// Creates a queue manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            admit_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the weight row for `(site, event_type)`, seeding the
    /// default row on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn weight_or_seed(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<NotificationWeight, EngineError> {
        if let Some(weight) = self.store.weight(site_id, event_type).await? {
            return Ok(weight);
        }
        let seeded = NotificationWeight::default_for(site_id, event_type);
        self.store.upsert_weight(seeded.clone()).await?;
        Ok(seeded)
    }

    /// Admits a canonical event, evicting the oldest of its type if the
    /// queue is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn admit(&self, event: CanonicalEvent) -> Result<Admission, EngineError> {
        let key_lock = self.lock_for(event.site_id, &event.event_type).await;
        let _guard = key_lock.lock().await;

        let weight = self.weight_or_seed(event.site_id, &event.event_type).await?;
        if weight.max_per_queue == 0 {
            return Ok(Admission {
                admitted: false,
                evicted: Vec::new(),
            });
        }

        let now = Utc::now();
        let live: Vec<_> = self
            .store
            .events_for_type(event.site_id, &event.event_type)
            .await?
            .into_iter()
            .filter(|e| !is_expired(e, weight.ttl_days, now))
            .collect();

        let mut evicted = Vec::new();
        let overflow = (live.len() + 1).saturating_sub(weight.max_per_queue as usize);
        for stale in live.iter().take(overflow) {
            self.store
                .remove_event(stale.site_id, &stale.event_id)
                .await?;
            evicted.push(stale.event_id.clone());
        }

        self.store.insert_event(event).await?;
        Ok(Admission {
            admitted: true,
            evicted,
        })
    }

    /// Returns a site's eligible events, weight descending, ties broken by
    /// recency (newest first). TTL-expired events are filtered out here.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn eligible(
        &self,
        site_id: SiteId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CanonicalEvent>, EngineError> {
        let weights: HashMap<String, NotificationWeight> = self
            .store
            .weights_for_site(site_id)
            .await?
            .into_iter()
            .map(|w| (w.event_type.clone(), w))
            .collect();

        let weight_of = |event: &CanonicalEvent| -> NotificationWeight {
            weights.get(&event.event_type).cloned().unwrap_or_else(|| {
                NotificationWeight::default_for(site_id, &event.event_type)
            })
        };

        let mut events: Vec<_> = self
            .store
            .events_for_site(site_id)
            .await?
            .into_iter()
            .filter(|e| !is_expired(e, weight_of(e).ttl_days, now))
            .collect();

        events.sort_by(|a, b| {
            weight_of(b)
                .weight
                .cmp(&weight_of(a).weight)
                .then(b.timestamp.cmp(&a.timestamp))
        });
        Ok(events)
    }

    /// Looks up (or creates) the admission lock for a queue key.
    async fn lock_for(&self, site_id: SiteId, event_type: &str) -> Arc<Mutex<()>> {
        let key = (site_id, event_type.to_string());
        if let Some(lock) = self.admit_locks.read().await.get(&key) {
            return Arc::clone(lock);
        }
        let mut locks = self.admit_locks.write().await;
        Arc::clone(locks.entry(key).or_default())
    }
}

/// TTL check: an event is expired once `now - timestamp > ttl_days`.
fn is_expired(event: &CanonicalEvent, ttl_days: u32, now: DateTime<Utc>) -> bool {
    now - event.timestamp > Duration::days(i64::from(ttl_days))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::keys;
    use crate::domain::{CampaignId, EventId};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_event(site: SiteId, event_type: &str, id: &str, at: DateTime<Utc>) -> CanonicalEvent {
        let mut normalized = BTreeMap::new();
        normalized.insert(keys::CUSTOMER_NAME.to_string(), json!("Sarah"));
        CanonicalEvent {
            event_id: EventId::from_native("shopstack", id),
            site_id: site,
            campaign_id: CampaignId::new(),
            provider: "shopstack".to_string(),
            provider_event_type: "order.created".to_string(),
            event_type: event_type.to_string(),
            timestamp: at,
            normalized,
            raw_payload: json!({}),
        }
    }

    fn queue() -> WeightedQueue {
        WeightedQueue::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn first_use_seeds_default_weight() {
        let q = queue();
        let site = SiteId::new();
        let weight = q.weight_or_seed(site, "purchase").await;
        let Ok(weight) = weight else {
            panic!("seed failed");
        };
        assert_eq!(weight.weight, 10);

        // Second read comes from the store, not a fresh default.
        let again = q.weight_or_seed(site, "purchase").await;
        assert_eq!(again.ok(), Some(weight));
    }

    #[tokio::test]
    async fn queue_cap_evicts_oldest_first() {
        let q = queue();
        let site = SiteId::new();
        let _ = q
            .store
            .upsert_weight(NotificationWeight {
                site_id: site,
                event_type: "purchase".to_string(),
                weight: 10,
                max_per_queue: 2,
                ttl_days: 30,
            })
            .await;

        let base = Utc::now();
        for (i, id) in ["e1", "e2", "e3"].iter().enumerate() {
            let at = base + Duration::seconds(i as i64);
            let admission = q.admit(make_event(site, "purchase", id, at)).await;
            let Ok(admission) = admission else {
                panic!("admission failed");
            };
            assert!(admission.admitted);
        }

        let eligible = q.eligible(site, Utc::now()).await;
        let Ok(eligible) = eligible else {
            panic!("eligible failed");
        };
        let ids: Vec<_> = eligible.iter().map(|e| e.event_id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["shopstack:e3", "shopstack:e2"]);
    }

    #[tokio::test]
    async fn ttl_eviction_is_lazy_and_boundary_exact() {
        let q = queue();
        let site = SiteId::new();
        let now = Utc::now();
        let ttl = Duration::days(30);

        let expired = make_event(site, "purchase", "old", now - ttl - Duration::seconds(1));
        let fresh = make_event(site, "purchase", "young", now - ttl + Duration::seconds(1));
        let _ = q.store.insert_event(expired).await;
        let _ = q.store.insert_event(fresh).await;
        let _ = q.weight_or_seed(site, "purchase").await;

        let eligible = q.eligible(site, now).await;
        let Ok(eligible) = eligible else {
            panic!("eligible failed");
        };
        let ids: Vec<_> = eligible.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["shopstack:young"]);
    }

    #[tokio::test]
    async fn eligible_orders_by_weight_then_recency() {
        let q = queue();
        let site = SiteId::new();
        let base = Utc::now();

        let _ = q.admit(make_event(site, "manual", "m1", base)).await;
        let _ = q
            .admit(make_event(site, "purchase", "p1", base - Duration::seconds(60)))
            .await;
        let _ = q
            .admit(make_event(site, "purchase", "p2", base - Duration::seconds(30)))
            .await;

        let eligible = q.eligible(site, Utc::now()).await;
        let Ok(eligible) = eligible else {
            panic!("eligible failed");
        };
        let ids: Vec<_> = eligible.iter().map(|e| e.event_id.as_str()).collect();
        // purchase (weight 10) outranks manual (weight 3); newest purchase first.
        assert_eq!(ids, vec!["shopstack:p2", "shopstack:p1", "shopstack:m1"]);
    }

    #[tokio::test]
    async fn max_per_queue_zero_disables_the_type() {
        let q = queue();
        let site = SiteId::new();
        let _ = q
            .store
            .upsert_weight(NotificationWeight {
                site_id: site,
                event_type: "manual".to_string(),
                weight: 3,
                max_per_queue: 0,
                ttl_days: 30,
            })
            .await;

        let admission = q.admit(make_event(site, "manual", "m1", Utc::now())).await;
        let Ok(admission) = admission else {
            panic!("admission failed");
        };
        assert!(!admission.admitted);
    }
}
