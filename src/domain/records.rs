//! Bookkeeping records: idempotency and visitor exposure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::CampaignId;

/// One processed webhook delivery, keyed by `(webhook_type, idempotency_key)`.
///
/// Created on first delivery and never mutated. A second delivery with the
/// same pair is a no-op that still acknowledges success upstream. Records
/// may be pruned once the retention window (which must exceed the
/// provider's retry window) has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Webhook type string, usually the provider id.
    pub webhook_type: String,
    /// Provider-native id, or a derived stable hash when none exists.
    pub idempotency_key: String,
    /// Payload snapshot from the first delivery, kept for audit.
    pub payload_snapshot: Value,
    /// When the first delivery was processed.
    pub first_seen_at: DateTime<Utc>,
}

/// Exposure counter for one `(campaign, visitor-or-session)` pair.
///
/// Invariants: `count` never decreases and `last_shown_at` monotonically
/// increases. Updated only when the selector actually shows a notification,
/// never for campaigns that were merely considered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorExposure {
    /// Campaign the exposure counts against.
    pub campaign_id: CampaignId,
    /// Visitor id or session id the exposure is keyed by.
    pub subject: String,
    /// Number of times the campaign has been shown to this subject.
    pub count: u32,
    /// Timestamp of the most recent exposure.
    pub last_shown_at: DateTime<Utc>,
}
