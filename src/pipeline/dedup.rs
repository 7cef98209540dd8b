//! Idempotency guard: collapses provider retries into one processing pass.
//!
//! The key is the provider-native transaction/event id when the adapter
//! found one. Otherwise [`DedupGuard::derive_key`] hashes
//! `(provider, event_type, payload, time bucket)` — the bucket is coarse
//! enough (default 5 minutes) to collapse retries of the same delivery but
//! fine enough not to collapse distinct real events that happen to carry
//! identical payloads.
//!
//! A rejected duplicate is treated as *success* by the caller so the
//! provider stops retrying.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::IdempotencyRecord;
use crate::error::EngineError;
use crate::store::Store;

/// Idempotency/dedup guard over the storage interface.
#[derive(Debug, Clone)]
pub struct DedupGuard {
    store: Arc<dyn Store>,
    retention: Duration,
    bucket_secs: i64,
}

impl DedupGuard {
    /// Retention floor: providers retry for at most a day, so records must
    /// outlive that.
    pub const MIN_RETENTION_HOURS: i64 = 24;

    /// Creates a guard with the given retention window and time bucket.
    ///
    /// `retention_hours` below the 24h floor is raised to the floor.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, retention_hours: i64, bucket_secs: i64) -> Self {
        Self {
            store,
            retention: Duration::hours(retention_hours.max(Self::MIN_RETENTION_HOURS)),
            bucket_secs: bucket_secs.max(1),
        }
    }

    /// Accepts or rejects one delivery.
    ///
    /// Returns `true` on first sight of `(webhook_type, key)` — the caller
    /// should process the delivery. Returns `false` for a replay — the
    /// caller must skip processing but still acknowledge success upstream.
    /// The check-then-insert is atomic at the storage layer, so two
    /// concurrent deliveries of the same retry cannot both pass.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn accept(
        &self,
        webhook_type: &str,
        key: &str,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        // Opportunistic pruning; failure here must not block ingestion.
        if let Err(error) = self.store.prune_idempotency(now - self.retention).await {
            tracing::warn!(%error, "idempotency pruning failed");
        }

        self.store
            .insert_idempotency_if_absent(IdempotencyRecord {
                webhook_type: webhook_type.to_string(),
                idempotency_key: key.to_string(),
                payload_snapshot: payload.clone(),
                first_seen_at: now,
            })
            .await
    }

    /// Derives a stable idempotency key for a delivery without a native id.
    #[must_use]
    pub fn derive_key(
        &self,
        provider: &str,
        event_type: &str,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> String {
        let bucket = received_at.timestamp().div_euclid(self.bucket_secs);
        let serialized = serde_json::to_string(payload).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(b"|");
        hasher.update(event_type.as_bytes());
        hasher.update(b"|");
        hasher.update(serialized.as_bytes());
        hasher.update(b"|");
        hasher.update(bucket.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn guard() -> DedupGuard {
        DedupGuard::new(Arc::new(MemoryStore::new()), 48, 300)
    }

    #[tokio::test]
    async fn first_accept_then_reject() {
        let guard = guard();
        let payload = json!({ "id": 1 });
        let now = Utc::now();

        let first = guard.accept("shopstack", "shopstack:1001", &payload, now).await;
        let second = guard.accept("shopstack", "shopstack:1001", &payload, now).await;
        assert_eq!(first.ok(), Some(true));
        assert_eq!(second.ok(), Some(false));
    }

    #[tokio::test]
    async fn concurrent_accepts_admit_exactly_one() {
        let guard = guard();
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                guard
                    .accept("paywave", "paywave:evt_1", &json!({ "id": "evt_1" }), now)
                    .await
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            let Ok(Ok(fresh)) = handle.await else {
                panic!("accept task failed");
            };
            if fresh {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn retention_floor_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let guard = DedupGuard::new(Arc::clone(&store) as Arc<dyn Store>, 1, 300);
        assert_eq!(guard.retention, Duration::hours(DedupGuard::MIN_RETENTION_HOURS));
    }

    #[test]
    fn derived_key_is_stable_within_a_bucket() {
        let guard = guard();
        let payload = json!({ "name": "Sarah" });
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(30);

        let a = guard.derive_key("formly", "form_response", &payload, t0);
        let b = guard.derive_key("formly", "form_response", &payload, t0);
        assert_eq!(a, b);

        // Within the same 300s bucket retries still collapse.
        let bucket0 = t0.timestamp().div_euclid(300);
        if t1.timestamp().div_euclid(300) == bucket0 {
            assert_eq!(guard.derive_key("formly", "form_response", &payload, t1), a);
        }
    }

    #[test]
    fn derived_key_differs_across_buckets_and_payloads() {
        let guard = guard();
        let payload = json!({ "name": "Sarah" });
        let t0 = Utc::now();
        let later = t0 + Duration::seconds(900);

        assert_ne!(
            guard.derive_key("formly", "form_response", &payload, t0),
            guard.derive_key("formly", "form_response", &payload, later)
        );
        assert_ne!(
            guard.derive_key("formly", "form_response", &payload, t0),
            guard.derive_key("formly", "form_response", &json!({ "name": "Dana" }), t0)
        );
    }
}
