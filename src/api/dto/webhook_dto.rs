//! Webhook ingress response DTOs.

use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement returned for a handled webhook delivery.
///
/// A replayed delivery still acknowledges with 2xx (`duplicates` > 0) so
/// the provider stops retrying.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `"ok"` for a 2xx response.
    pub status: &'static str,
    /// Events admitted to the queue.
    pub processed: usize,
    /// Replayed deliveries dropped by the idempotency guard.
    pub duplicates: usize,
    /// Items that passed dedup but were not admitted.
    pub skipped: usize,
}
