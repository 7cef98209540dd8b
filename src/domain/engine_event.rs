//! Domain events emitted by the engine.
//!
//! Every state-changing step publishes an [`EngineEvent`] through the
//! [`super::EventBus`] so in-process observers (analytics, billing hooks,
//! debugging subscribers) can watch the pipeline without being coupled to
//! it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{CampaignId, EventId, ExperimentId, SiteId};

/// Why an event left the eligible queue.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Pushed out by a newer event of the same type at `max_per_queue`.
    QueueCap,
    /// Explicitly cleared by an operator.
    Cleared,
}

/// Engine event emitted after a pipeline or selection state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A canonical event passed dedup and was admitted to the queue.
    EventAdmitted {
        /// Owning site.
        site_id: SiteId,
        /// Admitted event.
        event_id: EventId,
        /// Canonical event type.
        canonical_type: String,
        /// Admission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An eligible event was evicted from the queue.
    EventEvicted {
        /// Owning site.
        site_id: SiteId,
        /// Evicted event.
        event_id: EventId,
        /// Why it was evicted.
        reason: EvictionReason,
        /// Eviction timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A replayed delivery was dropped by the dedup guard.
    DuplicateDropped {
        /// Webhook type the duplicate arrived under.
        webhook_type: String,
        /// Idempotency key that collided.
        idempotency_key: String,
        /// Drop timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The selector chose a notification for a visitor.
    NotificationSelected {
        /// Owning site.
        site_id: SiteId,
        /// Campaign whose event was shown.
        campaign_id: CampaignId,
        /// Chosen event.
        event_id: EventId,
        /// Visitor shown to.
        visitor_id: String,
        /// Selection timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An A/B test crossed the confidence threshold and pinned a winner.
    WinnerDeclared {
        /// Experiment that concluded.
        experiment_id: ExperimentId,
        /// Winning variant.
        variant_id: String,
        /// Confidence at declaration time, 0–100.
        confidence: f64,
        /// Declaration timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Returns the snake_case discriminator string for this event.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventAdmitted { .. } => "event_admitted",
            Self::EventEvicted { .. } => "event_evicted",
            Self::DuplicateDropped { .. } => "duplicate_dropped",
            Self::NotificationSelected { .. } => "notification_selected",
            Self::WinnerDeclared { .. } => "winner_declared",
        }
    }
}
