//! Stats beacon DTOs (view/click).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Optional beacon body naming the experiment variant that was rendered.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StatsRequest {
    /// Variant id shown to the visitor, when the campaign runs an A/B test.
    #[serde(default)]
    pub variant: Option<String>,
}

/// Beacon acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsAck {
    /// Always `"recorded"`.
    pub status: &'static str,
}
