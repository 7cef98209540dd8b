//! Storage interface and backends.
//!
//! The engine never assumes a query language — the [`Store`] trait exposes
//! only point lookups by key, range scans by `(site, event_type)` or
//! `(campaign, subject)`, and atomic upsert/increment primitives. The three
//! check-then-act operations the engine relies on for correctness are
//! atomic at this boundary:
//!
//! - [`Store::insert_idempotency_if_absent`] — first-writer-wins insert,
//! - [`Store::record_exposure`] — compare-and-increment per subject,
//! - [`Store::pin_winner`] — set-once winner declaration.
//!
//! Backends: [`MemoryStore`] (tests, persistence-disabled deployments) and
//! [`PostgresStore`] (sqlx).

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Campaign, CampaignId, CanonicalEvent, Connector, EventId, ExperimentId, ExperimentState,
    IdempotencyRecord, NotificationWeight, SiteId, VisitorExposure,
};
use crate::error::EngineError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Backend-agnostic async storage interface for all engine records.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    // --- Idempotency ---

    /// Inserts an idempotency record unless its key pair already exists.
    ///
    /// Returns `true` when the record was inserted (first delivery) and
    /// `false` when the `(webhook_type, idempotency_key)` pair was already
    /// present. Must be atomic under concurrent calls for the same pair.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn insert_idempotency_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<bool, EngineError>;

    /// Deletes idempotency records first seen before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn prune_idempotency(&self, before: DateTime<Utc>) -> Result<u64, EngineError>;

    // --- Canonical events ---

    /// Persists a canonical event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn insert_event(&self, event: CanonicalEvent) -> Result<(), EngineError>;

    /// Removes a canonical event by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn remove_event(&self, site_id: SiteId, event_id: &EventId) -> Result<(), EngineError>;

    /// Range scan: all events of one type for a site, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn events_for_type(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Vec<CanonicalEvent>, EngineError>;

    /// Range scan: all events for a site, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn events_for_site(&self, site_id: SiteId) -> Result<Vec<CanonicalEvent>, EngineError>;

    // --- Notification weights ---

    /// Point lookup of the weight row for `(site, event_type)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn weight(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Option<NotificationWeight>, EngineError>;

    /// Inserts or updates a weight row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn upsert_weight(&self, weight: NotificationWeight) -> Result<(), EngineError>;

    /// All weight rows for a site.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn weights_for_site(
        &self,
        site_id: SiteId,
    ) -> Result<Vec<NotificationWeight>, EngineError>;

    /// Replaces a site's weight rows wholesale (bulk reset-to-defaults).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn replace_weights(
        &self,
        site_id: SiteId,
        weights: Vec<NotificationWeight>,
    ) -> Result<(), EngineError>;

    // --- Campaigns ---

    /// Point lookup of a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn campaign(&self, campaign_id: CampaignId) -> Result<Option<Campaign>, EngineError>;

    /// All campaigns for a site.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn campaigns_for_site(&self, site_id: SiteId) -> Result<Vec<Campaign>, EngineError>;

    /// Inserts or updates a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn upsert_campaign(&self, campaign: Campaign) -> Result<(), EngineError>;

    // --- Connectors ---

    /// Resolves a webhook token to its connector.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn connector_by_token(&self, token: &str) -> Result<Option<Connector>, EngineError>;

    /// Finds a site's connector for a given provider (polling sync).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn connector_for_provider(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<Connector>, EngineError>;

    /// Inserts or updates a connector.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn upsert_connector(&self, connector: Connector) -> Result<(), EngineError>;

    // --- Polling cursors ---

    /// Last stored page cursor for `(site, provider)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<String>, EngineError>;

    /// Stores the page cursor for `(site, provider)` (upsert).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn set_poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
        cursor: &str,
    ) -> Result<(), EngineError>;

    // --- Visitor exposures ---

    /// Point lookup of the exposure counter for `(campaign, subject)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
    ) -> Result<Option<VisitorExposure>, EngineError>;

    /// Atomically increments the exposure counter for `(campaign, subject)`.
    ///
    /// `last_shown_at` only moves forward; `count` only grows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn record_exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
        at: DateTime<Utc>,
    ) -> Result<VisitorExposure, EngineError>;

    // --- Campaign analytics counter ---

    /// Atomically increments a campaign's view counter, returning the new
    /// total.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn increment_campaign_views(&self, campaign_id: CampaignId) -> Result<u64, EngineError>;

    // --- Experiments ---

    /// Point lookup of an experiment's state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Option<ExperimentState>, EngineError>;

    /// Inserts or replaces an experiment's state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure.
    async fn upsert_experiment(&self, state: ExperimentState) -> Result<(), EngineError>;

    /// Atomically increments a variant's view counter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure, or
    /// [`EngineError::ExperimentNotFound`] when the experiment is unknown.
    async fn add_variant_view(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError>;

    /// Atomically increments a variant's click counter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure, or
    /// [`EngineError::ExperimentNotFound`] when the experiment is unknown.
    async fn add_variant_click(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError>;

    /// Pins the experiment winner if none is pinned yet.
    ///
    /// Returns `true` when this call set the winner, `false` when one was
    /// already pinned (the existing winner is left untouched).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on backend failure, or
    /// [`EngineError::ExperimentNotFound`] when the experiment is unknown.
    async fn pin_winner(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError>;
}
