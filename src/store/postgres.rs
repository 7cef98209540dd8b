//! PostgreSQL implementation of the storage interface.
//!
//! Key columns are real columns so lookups and scans stay indexed;
//! structured bodies (campaign rules, connectors, canonical events) are
//! stored as JSONB. The three atomic operations use `ON CONFLICT` upserts
//! and guarded `UPDATE`s rather than transactions, so they stay a single
//! round-trip each.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::Store;
use crate::domain::{
    Campaign, CampaignId, CanonicalEvent, Connector, EventId, ExperimentId, ExperimentState,
    IdempotencyRecord, NotificationWeight, SiteId, Variant, VisitorExposure,
};
use crate::error::EngineError;

/// PostgreSQL-backed [`Store`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn storage_err(e: sqlx::Error) -> EngineError {
    EngineError::StorageError(e.to_string())
}

fn encode_err(e: serde_json::Error) -> EngineError {
    EngineError::StorageError(format!("encode: {e}"))
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the engine's tables when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), EngineError> {
        const DDL: &[&str] = &[
            "CREATE TABLE IF NOT EXISTS idempotency (
                webhook_type TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                payload JSONB NOT NULL,
                first_seen_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (webhook_type, idempotency_key)
            )",
            "CREATE TABLE IF NOT EXISTS events (
                site_id UUID NOT NULL,
                event_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                ts TIMESTAMPTZ NOT NULL,
                body JSONB NOT NULL,
                PRIMARY KEY (site_id, event_id)
            )",
            "CREATE TABLE IF NOT EXISTS weights (
                site_id UUID NOT NULL,
                event_type TEXT NOT NULL,
                weight INT NOT NULL,
                max_per_queue INT NOT NULL,
                ttl_days INT NOT NULL,
                PRIMARY KEY (site_id, event_type)
            )",
            "CREATE TABLE IF NOT EXISTS campaigns (
                campaign_id UUID PRIMARY KEY,
                site_id UUID NOT NULL,
                priority INT NOT NULL,
                body JSONB NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS connectors (
                token TEXT PRIMARY KEY,
                site_id UUID NOT NULL,
                provider TEXT NOT NULL,
                body JSONB NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS poll_cursors (
                site_id UUID NOT NULL,
                provider TEXT NOT NULL,
                page_cursor TEXT NOT NULL,
                PRIMARY KEY (site_id, provider)
            )",
            "CREATE TABLE IF NOT EXISTS exposures (
                campaign_id UUID NOT NULL,
                subject TEXT NOT NULL,
                count INT NOT NULL,
                last_shown_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (campaign_id, subject)
            )",
            "CREATE TABLE IF NOT EXISTS campaign_views (
                campaign_id UUID PRIMARY KEY,
                views BIGINT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS experiments (
                experiment_id UUID PRIMARY KEY,
                winner_variant_id TEXT,
                winner_declared_at TIMESTAMPTZ,
                winner_permanent BOOLEAN NOT NULL DEFAULT FALSE
            )",
            "CREATE TABLE IF NOT EXISTS variants (
                experiment_id UUID NOT NULL,
                variant_id TEXT NOT NULL,
                is_control BOOLEAN NOT NULL,
                position INT NOT NULL,
                views BIGINT NOT NULL,
                clicks BIGINT NOT NULL,
                PRIMARY KEY (experiment_id, variant_id)
            )",
        ];
        for statement in DDL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_idempotency_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            "INSERT INTO idempotency (webhook_type, idempotency_key, payload, first_seen_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(&record.webhook_type)
        .bind(&record.idempotency_key)
        .bind(&record.payload_snapshot)
        .bind(record.first_seen_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn prune_idempotency(&self, before: DateTime<Utc>) -> Result<u64, EngineError> {
        let result = sqlx::query("DELETE FROM idempotency WHERE first_seen_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn insert_event(&self, event: CanonicalEvent) -> Result<(), EngineError> {
        let body = serde_json::to_value(&event).map_err(encode_err)?;
        sqlx::query(
            "INSERT INTO events (site_id, event_id, event_type, ts, body) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(event.site_id.as_uuid())
        .bind(event.event_id.as_str())
        .bind(&event.event_type)
        .bind(event.timestamp)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn remove_event(&self, site_id: SiteId, event_id: &EventId) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM events WHERE site_id = $1 AND event_id = $2")
            .bind(site_id.as_uuid())
            .bind(event_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn events_for_type(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Vec<CanonicalEvent>, EngineError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM events WHERE site_id = $1 AND event_type = $2 ORDER BY ts ASC",
        )
        .bind(site_id.as_uuid())
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        decode_events(rows)
    }

    async fn events_for_site(&self, site_id: SiteId) -> Result<Vec<CanonicalEvent>, EngineError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM events WHERE site_id = $1 ORDER BY ts ASC",
        )
        .bind(site_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        decode_events(rows)
    }

    async fn weight(
        &self,
        site_id: SiteId,
        event_type: &str,
    ) -> Result<Option<NotificationWeight>, EngineError> {
        let row = sqlx::query_as::<_, (i32, i32, i32)>(
            "SELECT weight, max_per_queue, ttl_days FROM weights \
             WHERE site_id = $1 AND event_type = $2",
        )
        .bind(site_id.as_uuid())
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(|(weight, max_per_queue, ttl_days)| NotificationWeight {
            site_id,
            event_type: event_type.to_string(),
            weight: u32::try_from(weight).unwrap_or(0),
            max_per_queue: u32::try_from(max_per_queue).unwrap_or(0),
            ttl_days: u32::try_from(ttl_days).unwrap_or(0),
        }))
    }

    async fn upsert_weight(&self, weight: NotificationWeight) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO weights (site_id, event_type, weight, max_per_queue, ttl_days) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (site_id, event_type) DO UPDATE SET \
             weight = EXCLUDED.weight, max_per_queue = EXCLUDED.max_per_queue, \
             ttl_days = EXCLUDED.ttl_days",
        )
        .bind(weight.site_id.as_uuid())
        .bind(&weight.event_type)
        .bind(i64::from(weight.weight))
        .bind(i64::from(weight.max_per_queue))
        .bind(i64::from(weight.ttl_days))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn weights_for_site(
        &self,
        site_id: SiteId,
    ) -> Result<Vec<NotificationWeight>, EngineError> {
        let rows = sqlx::query_as::<_, (String, i32, i32, i32)>(
            "SELECT event_type, weight, max_per_queue, ttl_days FROM weights \
             WHERE site_id = $1 ORDER BY event_type ASC",
        )
        .bind(site_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows
            .into_iter()
            .map(
                |(event_type, weight, max_per_queue, ttl_days)| NotificationWeight {
                    site_id,
                    event_type,
                    weight: u32::try_from(weight).unwrap_or(0),
                    max_per_queue: u32::try_from(max_per_queue).unwrap_or(0),
                    ttl_days: u32::try_from(ttl_days).unwrap_or(0),
                },
            )
            .collect())
    }

    async fn replace_weights(
        &self,
        site_id: SiteId,
        weights: Vec<NotificationWeight>,
    ) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM weights WHERE site_id = $1")
            .bind(site_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        for weight in weights {
            self.upsert_weight(weight).await?;
        }
        Ok(())
    }

    async fn campaign(&self, campaign_id: CampaignId) -> Result<Option<Campaign>, EngineError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM campaigns WHERE campaign_id = $1",
        )
        .bind(campaign_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(|(body,)| serde_json::from_value(body).map_err(encode_err))
            .transpose()
    }

    async fn campaigns_for_site(&self, site_id: SiteId) -> Result<Vec<Campaign>, EngineError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM campaigns WHERE site_id = $1 ORDER BY priority DESC",
        )
        .bind(site_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter()
            .map(|(body,)| serde_json::from_value(body).map_err(encode_err))
            .collect()
    }

    async fn upsert_campaign(&self, campaign: Campaign) -> Result<(), EngineError> {
        let body = serde_json::to_value(&campaign).map_err(encode_err)?;
        sqlx::query(
            "INSERT INTO campaigns (campaign_id, site_id, priority, body) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (campaign_id) DO UPDATE SET \
             priority = EXCLUDED.priority, body = EXCLUDED.body",
        )
        .bind(campaign.campaign_id.as_uuid())
        .bind(campaign.site_id.as_uuid())
        .bind(i64::from(campaign.priority))
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn connector_by_token(&self, token: &str) -> Result<Option<Connector>, EngineError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM connectors WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(|(body,)| serde_json::from_value(body).map_err(encode_err))
            .transpose()
    }

    async fn connector_for_provider(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<Connector>, EngineError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM connectors WHERE site_id = $1 AND provider = $2 LIMIT 1",
        )
        .bind(site_id.as_uuid())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(|(body,)| serde_json::from_value(body).map_err(encode_err))
            .transpose()
    }

    async fn upsert_connector(&self, connector: Connector) -> Result<(), EngineError> {
        let body = serde_json::to_value(&connector).map_err(encode_err)?;
        sqlx::query(
            "INSERT INTO connectors (token, site_id, provider, body) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (token) DO UPDATE SET \
             site_id = EXCLUDED.site_id, provider = EXCLUDED.provider, body = EXCLUDED.body",
        )
        .bind(&connector.token)
        .bind(connector.site_id.as_uuid())
        .bind(&connector.provider)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
    ) -> Result<Option<String>, EngineError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT page_cursor FROM poll_cursors WHERE site_id = $1 AND provider = $2",
        )
        .bind(site_id.as_uuid())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(|(cursor,)| cursor))
    }

    async fn set_poll_cursor(
        &self,
        site_id: SiteId,
        provider: &str,
        cursor: &str,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO poll_cursors (site_id, provider, page_cursor) VALUES ($1, $2, $3) \
             ON CONFLICT (site_id, provider) DO UPDATE SET page_cursor = EXCLUDED.page_cursor",
        )
        .bind(site_id.as_uuid())
        .bind(provider)
        .bind(cursor)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
    ) -> Result<Option<VisitorExposure>, EngineError> {
        let row = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
            "SELECT count, last_shown_at FROM exposures \
             WHERE campaign_id = $1 AND subject = $2",
        )
        .bind(campaign_id.as_uuid())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(|(count, last_shown_at)| VisitorExposure {
            campaign_id,
            subject: subject.to_string(),
            count: u32::try_from(count).unwrap_or(0),
            last_shown_at,
        }))
    }

    async fn record_exposure(
        &self,
        campaign_id: CampaignId,
        subject: &str,
        at: DateTime<Utc>,
    ) -> Result<VisitorExposure, EngineError> {
        let (count, last_shown_at) = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
            "INSERT INTO exposures (campaign_id, subject, count, last_shown_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (campaign_id, subject) DO UPDATE SET \
             count = exposures.count + 1, \
             last_shown_at = GREATEST(exposures.last_shown_at, EXCLUDED.last_shown_at) \
             RETURNING count, last_shown_at",
        )
        .bind(campaign_id.as_uuid())
        .bind(subject)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(VisitorExposure {
            campaign_id,
            subject: subject.to_string(),
            count: u32::try_from(count).unwrap_or(0),
            last_shown_at,
        })
    }

    async fn increment_campaign_views(&self, campaign_id: CampaignId) -> Result<u64, EngineError> {
        let (views,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO campaign_views (campaign_id, views) VALUES ($1, 1) \
             ON CONFLICT (campaign_id) DO UPDATE SET views = campaign_views.views + 1 \
             RETURNING views",
        )
        .bind(campaign_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(u64::try_from(views).unwrap_or(0))
    }

    async fn experiment(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Option<ExperimentState>, EngineError> {
        let header = sqlx::query_as::<_, (Option<String>, Option<DateTime<Utc>>, bool)>(
            "SELECT winner_variant_id, winner_declared_at, winner_permanent \
             FROM experiments WHERE experiment_id = $1",
        )
        .bind(experiment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        let Some((winner_variant_id, winner_declared_at, winner_permanent)) = header else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, (String, bool, i64, i64)>(
            "SELECT variant_id, is_control, views, clicks FROM variants \
             WHERE experiment_id = $1 ORDER BY position ASC",
        )
        .bind(experiment_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(Some(ExperimentState {
            experiment_id,
            variants: rows
                .into_iter()
                .map(|(id, is_control, views, clicks)| Variant {
                    id,
                    is_control,
                    views: u64::try_from(views).unwrap_or(0),
                    clicks: u64::try_from(clicks).unwrap_or(0),
                })
                .collect(),
            winner_variant_id,
            winner_declared_at,
            winner_permanent,
        }))
    }

    async fn upsert_experiment(&self, state: ExperimentState) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO experiments \
             (experiment_id, winner_variant_id, winner_declared_at, winner_permanent) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (experiment_id) DO UPDATE SET \
             winner_variant_id = EXCLUDED.winner_variant_id, \
             winner_declared_at = EXCLUDED.winner_declared_at, \
             winner_permanent = EXCLUDED.winner_permanent",
        )
        .bind(state.experiment_id.as_uuid())
        .bind(&state.winner_variant_id)
        .bind(state.winner_declared_at)
        .bind(state.winner_permanent)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("DELETE FROM variants WHERE experiment_id = $1")
            .bind(state.experiment_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        for (position, variant) in state.variants.iter().enumerate() {
            sqlx::query(
                "INSERT INTO variants \
                 (experiment_id, variant_id, is_control, position, views, clicks) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(state.experiment_id.as_uuid())
            .bind(&variant.id)
            .bind(variant.is_control)
            .bind(i64::try_from(position).unwrap_or(0))
            .bind(i64::try_from(variant.views).unwrap_or(i64::MAX))
            .bind(i64::try_from(variant.clicks).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        }
        Ok(())
    }

    async fn add_variant_view(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        increment_variant(&self.pool, experiment_id, variant_id, "views").await
    }

    async fn add_variant_click(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        increment_variant(&self.pool, experiment_id, variant_id, "clicks").await
    }

    async fn pin_winner(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            "UPDATE experiments SET winner_variant_id = $2, winner_declared_at = $3 \
             WHERE experiment_id = $1 AND winner_variant_id IS NULL",
        )
        .bind(experiment_id.as_uuid())
        .bind(variant_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() == 1)
    }
}

/// Shared counter bump for variant views/clicks.
async fn increment_variant(
    pool: &PgPool,
    experiment_id: ExperimentId,
    variant_id: &str,
    column: &str,
) -> Result<(), EngineError> {
    // `column` is one of two compile-time literals, never user input.
    let statement = format!(
        "UPDATE variants SET {column} = {column} + 1 \
         WHERE experiment_id = $1 AND variant_id = $2"
    );
    let result = sqlx::query(&statement)
        .bind(experiment_id.as_uuid())
        .bind(variant_id)
        .execute(pool)
        .await
        .map_err(storage_err)?;
    if result.rows_affected() == 0 {
        // Distinguish an unknown experiment from an unknown variant id; the
        // latter is silently ignored like the memory backend does.
        let exists = sqlx::query_as::<_, (Uuid,)>(
            "SELECT experiment_id FROM experiments WHERE experiment_id = $1",
        )
        .bind(experiment_id.as_uuid())
        .fetch_optional(pool)
        .await
        .map_err(storage_err)?;
        if exists.is_none() {
            return Err(EngineError::ExperimentNotFound(*experiment_id.as_uuid()));
        }
    }
    Ok(())
}

fn decode_events(rows: Vec<(serde_json::Value,)>) -> Result<Vec<CanonicalEvent>, EngineError> {
    rows.into_iter()
        .map(|(body,)| serde_json::from_value(body).map_err(encode_err))
        .collect()
}
