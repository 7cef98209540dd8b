//! Weight administration DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{NotificationWeight, SiteId};

/// One weight row on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeightDto {
    /// Canonical event type the row applies to.
    pub event_type: String,
    /// Relative ranking weight (not a probability).
    pub weight: u32,
    /// Queue capacity for this type. `0` disables the type.
    pub max_per_queue: u32,
    /// Days an event of this type stays eligible.
    pub ttl_days: u32,
}

impl WeightDto {
    /// Converts into the domain row for `site_id`.
    #[must_use]
    pub fn into_domain(self, site_id: SiteId) -> NotificationWeight {
        NotificationWeight {
            site_id,
            event_type: self.event_type,
            weight: self.weight,
            max_per_queue: self.max_per_queue,
            ttl_days: self.ttl_days,
        }
    }
}

impl From<NotificationWeight> for WeightDto {
    fn from(w: NotificationWeight) -> Self {
        Self {
            event_type: w.event_type,
            weight: w.weight,
            max_per_queue: w.max_per_queue,
            ttl_days: w.ttl_days,
        }
    }
}

/// A site's full weight table.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeightsResponse {
    /// Owning site.
    pub site_id: uuid::Uuid,
    /// Weight rows, highest weight first.
    pub weights: Vec<WeightDto>,
}

/// Bulk weight update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWeightsRequest {
    /// Rows to insert or update.
    pub weights: Vec<WeightDto>,
}
