//! Engine orchestration.
//!
//! [`EngineService`] wires the provider registry, the ingestion pipeline,
//! the selector, and the experiment evaluator behind one facade the HTTP
//! handlers call into. Handlers stay thin: they translate DTOs and status
//! codes, the service owns ordering and failure policy.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::domain::{
    CampaignId, Connector, EngineEvent, EventBus, EvictionReason, ExperimentState,
    NotificationWeight, RawProviderEvent, SiteId, VisitorContext,
};
use crate::error::EngineError;
use crate::experiment::ExperimentEvaluator;
use crate::pipeline::{DedupGuard, WeightedQueue, normalizer};
use crate::providers::{AdapterContext, AdapterRegistry};
use crate::selection::{SelectedNotification, Selector};
use crate::store::Store;

/// Outcome of one webhook delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookOutcome {
    /// Events admitted to the queue.
    pub processed: usize,
    /// Replayed deliveries dropped by the dedup guard.
    pub duplicates: usize,
    /// Events that passed dedup but were not admitted (disabled type).
    pub skipped: usize,
}

/// Outcome of one polling sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Items on the fetched page.
    pub fetched: usize,
    /// Events admitted to the queue.
    pub processed: usize,
    /// Items dropped as duplicates.
    pub duplicates: usize,
    /// Items skipped (validation or processing failure, disabled type).
    pub skipped: usize,
    /// Cursor stored for the next pass, when the source is not exhausted.
    pub next_cursor: Option<String>,
}

enum Ingest {
    Admitted,
    Duplicate,
    Skipped,
}

/// Facade over the whole engine.
#[derive(Debug)]
pub struct EngineService {
    store: Arc<dyn Store>,
    registry: Arc<AdapterRegistry>,
    dedup: DedupGuard,
    queue: Arc<WeightedQueue>,
    selector: Selector,
    evaluator: ExperimentEvaluator,
    event_bus: EventBus,
}

impl EngineService {
    /// Wires the engine together over one store and event bus.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<AdapterRegistry>,
        event_bus: EventBus,
        dedup_retention_hours: i64,
        dedup_bucket_secs: i64,
    ) -> Self {
        let dedup = DedupGuard::new(
            Arc::clone(&store),
            dedup_retention_hours,
            dedup_bucket_secs,
        );
        let queue = Arc::new(WeightedQueue::new(Arc::clone(&store)));
        let selector = Selector::new(Arc::clone(&store), Arc::clone(&queue), event_bus.clone());
        let evaluator = ExperimentEvaluator::new(Arc::clone(&store), event_bus.clone());
        Self {
            store,
            registry,
            dedup,
            queue,
            selector,
            evaluator,
            event_bus,
        }
    }

    /// The provider adapter registry.
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// The underlying store, for admin-surface reads and seeding.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // --- Ingestion ---

    /// Handles one webhook delivery end to end.
    ///
    /// Order of checks: token resolution, provider match, signature (when
    /// the connector carries a secret), JSON parse, adapter validation.
    /// A replayed delivery is *not* an error: it counts as a duplicate in
    /// the outcome and the caller acknowledges success so the provider
    /// stops retrying.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IntegrationNotConfigured`] for an unknown or
    /// mismatched token, [`EngineError::SignatureRejected`] when signature
    /// verification fails, [`EngineError::UnknownProvider`] for an
    /// unregistered provider id, [`EngineError::MalformedPayload`] for
    /// bodies that fail parsing or validation, and
    /// [`EngineError::StorageError`] on backend failure.
    pub async fn handle_webhook(
        &self,
        provider: &str,
        token: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, EngineError> {
        let connector = self
            .store
            .connector_by_token(token)
            .await?
            .ok_or_else(|| EngineError::IntegrationNotConfigured(token.to_string()))?;
        if connector.provider != provider {
            return Err(EngineError::IntegrationNotConfigured(token.to_string()));
        }

        if let Some(secret) = &connector.signing_secret {
            let verified = signature.is_some_and(|sig| verify_signature(secret, body, sig));
            if !verified {
                return Err(EngineError::SignatureRejected(provider.to_string()));
            }
        }

        let payload: Value = serde_json::from_slice(body).map_err(|e| {
            EngineError::MalformedPayload {
                provider: provider.to_string(),
                reason: format!("invalid JSON: {e}"),
            }
        })?;

        let adapter = self.registry.get(provider)?;
        if !adapter.validate(&payload) {
            return Err(EngineError::MalformedPayload {
                provider: provider.to_string(),
                reason: "payload failed shape validation".to_string(),
            });
        }

        let ctx = AdapterContext {
            field_mappings: connector.field_mappings.clone(),
        };
        let items = adapter.process(&ctx, &payload, Utc::now())?;

        let mut outcome = WebhookOutcome::default();
        for item in items {
            match self
                .ingest_item(&connector, adapter.canonical_event_type(), item)
                .await?
            {
                Ingest::Admitted => outcome.processed += 1,
                Ingest::Duplicate => outcome.duplicates += 1,
                Ingest::Skipped => outcome.skipped += 1,
            }
        }
        tracing::info!(
            provider,
            site_id = %connector.site_id,
            processed = outcome.processed,
            duplicates = outcome.duplicates,
            "webhook handled"
        );
        Ok(outcome)
    }

    /// Runs one polling sync pass for `(site, provider)`.
    ///
    /// Fetches a single page from the provider's poll source, pushes each
    /// item through the normal pipeline, and stores the next cursor. Item
    /// failures are logged and skipped so one bad item never aborts the
    /// page.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProvider`] when no poll source is
    /// registered, [`EngineError::IntegrationNotConfigured`] when the site
    /// has no connector for the provider, and
    /// [`EngineError::StorageError`] on backend failure.
    pub async fn run_poll(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<SyncOutcome, EngineError> {
        let source = self.registry.poll_source(provider)?;
        let adapter = self.registry.get(provider)?;
        let connector = self
            .store
            .connector_for_provider(site_id, provider)
            .await?
            .ok_or_else(|| EngineError::IntegrationNotConfigured(provider.to_string()))?;

        let cursor = self.store.poll_cursor(site_id, provider).await?;
        let page = source.fetch_page(cursor.as_deref()).await?;

        let ctx = AdapterContext {
            field_mappings: connector.field_mappings.clone(),
        };
        let mut outcome = SyncOutcome {
            fetched: page.items.len(),
            ..SyncOutcome::default()
        };
        for item in &page.items {
            if !adapter.validate(item) {
                tracing::warn!(provider, %site_id, "sync item failed validation, skipping");
                outcome.skipped += 1;
                continue;
            }
            let raw_events = match adapter.process(&ctx, item, Utc::now()) {
                Ok(events) => events,
                Err(error) => {
                    tracing::warn!(provider, %site_id, %error, "sync item rejected, skipping");
                    outcome.skipped += 1;
                    continue;
                }
            };
            for raw in raw_events {
                match self
                    .ingest_item(&connector, adapter.canonical_event_type(), raw)
                    .await?
                {
                    Ingest::Admitted => outcome.processed += 1,
                    Ingest::Duplicate => outcome.duplicates += 1,
                    Ingest::Skipped => outcome.skipped += 1,
                }
            }
        }

        if let Some(next) = &page.next_cursor {
            self.store.set_poll_cursor(site_id, provider, next).await?;
        }
        outcome.next_cursor = page.next_cursor;
        tracing::info!(
            provider,
            %site_id,
            fetched = outcome.fetched,
            processed = outcome.processed,
            "sync pass complete"
        );
        Ok(outcome)
    }

    /// One item through dedup, normalization, and admission.
    async fn ingest_item(
        &self,
        connector: &Connector,
        canonical_type: &str,
        raw: RawProviderEvent,
    ) -> Result<Ingest, EngineError> {
        let key = raw.native_id.clone().unwrap_or_else(|| {
            self.dedup
                .derive_key(&raw.provider, &raw.provider_event_type, &raw.payload, raw.received_at)
        });

        let fresh = self
            .dedup
            .accept(&raw.provider, &key, &raw.payload, raw.received_at)
            .await?;
        if !fresh {
            tracing::debug!(
                provider = %raw.provider,
                idempotency_key = %key,
                "duplicate delivery dropped"
            );
            self.event_bus.publish(EngineEvent::DuplicateDropped {
                webhook_type: raw.provider.clone(),
                idempotency_key: key,
                timestamp: raw.received_at,
            });
            return Ok(Ingest::Duplicate);
        }

        let canonical =
            normalizer::normalize(&raw, connector.site_id, connector.campaign_id, canonical_type);
        let event_id = canonical.event_id.clone();
        let event_type = canonical.event_type.clone();
        let timestamp = canonical.timestamp;
        let admission = self.queue.admit(canonical).await?;
        if !admission.admitted {
            return Ok(Ingest::Skipped);
        }

        for evicted in admission.evicted {
            self.event_bus.publish(EngineEvent::EventEvicted {
                site_id: connector.site_id,
                event_id: evicted,
                reason: EvictionReason::QueueCap,
                timestamp,
            });
        }
        self.event_bus.publish(EngineEvent::EventAdmitted {
            site_id: connector.site_id,
            event_id,
            canonical_type: event_type,
            timestamp,
        });
        Ok(Ingest::Admitted)
    }

    // --- Selection ---

    /// Selects the next notification for a visitor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure. The
    /// handler degrades errors to an empty selection so the visitor-facing
    /// endpoint never fails a page load.
    pub async fn select_next(
        &self,
        site_id: SiteId,
        ctx: &VisitorContext,
    ) -> Result<Option<SelectedNotification>, EngineError> {
        self.selector.select_next(site_id, ctx).await
    }

    // --- Stats ---

    /// Records a rendered-notification beacon for a campaign.
    ///
    /// Feeds the campaign's experiment when one is attached and the beacon
    /// names a variant; otherwise only validates the campaign.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CampaignNotFound`] for an unknown campaign,
    /// or [`EngineError::StorageError`] on backend failure.
    pub async fn record_view(
        &self,
        campaign_id: CampaignId,
        variant: Option<&str>,
    ) -> Result<(), EngineError> {
        let campaign = self
            .store
            .campaign(campaign_id)
            .await?
            .ok_or_else(|| EngineError::CampaignNotFound(campaign_id.into()))?;
        if let (Some(experiment_id), Some(variant)) = (campaign.experiment_id, variant) {
            self.evaluator.record_view(experiment_id, variant).await?;
        }
        Ok(())
    }

    /// Records a notification click for a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CampaignNotFound`] for an unknown campaign,
    /// or [`EngineError::StorageError`] on backend failure.
    pub async fn record_click(
        &self,
        campaign_id: CampaignId,
        variant: Option<&str>,
    ) -> Result<(), EngineError> {
        let campaign = self
            .store
            .campaign(campaign_id)
            .await?
            .ok_or_else(|| EngineError::CampaignNotFound(campaign_id.into()))?;
        if let (Some(experiment_id), Some(variant)) = (campaign.experiment_id, variant) {
            self.evaluator.record_click(experiment_id, variant).await?;
        }
        Ok(())
    }

    // --- Weight administration ---

    /// Returns a site's weight rows, seeding defaults for any built-in
    /// event type that has no row yet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn site_weights(
        &self,
        site_id: SiteId,
    ) -> Result<Vec<NotificationWeight>, EngineError> {
        let existing = self.store.weights_for_site(site_id).await?;
        for default in NotificationWeight::defaults_for_site(site_id) {
            if !existing.iter().any(|w| w.event_type == default.event_type) {
                self.store.upsert_weight(default).await?;
            }
        }
        let mut weights = self.store.weights_for_site(site_id).await?;
        weights.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.event_type.cmp(&b.event_type)));
        Ok(weights)
    }

    /// Applies weight updates for a site.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] when a row targets a different
    /// site, or [`EngineError::StorageError`] on backend failure.
    pub async fn update_weights(
        &self,
        site_id: SiteId,
        weights: Vec<NotificationWeight>,
    ) -> Result<Vec<NotificationWeight>, EngineError> {
        for weight in &weights {
            if weight.site_id != site_id {
                return Err(EngineError::InvalidRule(format!(
                    "weight row for event type {} targets another site",
                    weight.event_type
                )));
            }
        }
        for weight in weights {
            self.store.upsert_weight(weight).await?;
        }
        self.site_weights(site_id).await
    }

    /// Resets a site's weights to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    pub async fn reset_weights(
        &self,
        site_id: SiteId,
    ) -> Result<Vec<NotificationWeight>, EngineError> {
        self.store
            .replace_weights(site_id, NotificationWeight::defaults_for_site(site_id))
            .await?;
        self.site_weights(site_id).await
    }

    // --- Experiments ---

    /// Loads an experiment together with its freshly computed confidence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn experiment_state(
        &self,
        experiment_id: crate::domain::ExperimentId,
    ) -> Result<(ExperimentState, f64), EngineError> {
        self.evaluator.state_with_confidence(experiment_id).await
    }

    /// Locks in the declared winner permanently.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, [`EngineError::InvalidRule`] when no winner is declared
    /// yet, or [`EngineError::StorageError`] on backend failure.
    pub async fn make_winner_permanent(
        &self,
        experiment_id: crate::domain::ExperimentId,
    ) -> Result<ExperimentState, EngineError> {
        self.evaluator.make_permanent(experiment_id).await
    }

    /// Restarts an experiment with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn restart_experiment(
        &self,
        experiment_id: crate::domain::ExperimentId,
    ) -> Result<ExperimentState, EngineError> {
        self.evaluator.restart(experiment_id).await
    }
}

/// Verifies a hex-encoded HMAC-SHA256 signature over the raw body.
///
/// Comparison happens inside `Mac::verify_slice`, which is constant-time.
fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let Ok(decoded) = hex::decode(signature.trim()) else {
        return false;
    };
    mac.verify_slice(&decoded).is_ok()
}
