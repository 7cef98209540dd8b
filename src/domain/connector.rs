//! Connectors: the link between an inbound webhook token and a campaign.
//!
//! Each configured integration gets a connector row. The token appears in
//! the webhook URL (`/hooks/{provider}/{token}`) and resolves to the owning
//! site and campaign; a delivery whose token resolves to nothing is
//! rejected as [`crate::error::EngineError::IntegrationNotConfigured`],
//! distinct from an unknown provider id.

use serde::{Deserialize, Serialize};

use super::ids::{CampaignId, SiteId};

/// One dotted-path extraction rule for the generic field-mapping adapter.
///
/// `path` is walked against the raw payload tree (`customer.address.city`,
/// array indices as numeric segments); `default` is substituted when any
/// segment is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Canonical key to populate (e.g. `template.customer_name`).
    pub canonical_key: String,
    /// Dotted path into the raw payload.
    pub path: String,
    /// Value used when the path does not resolve.
    pub default: String,
}

/// A configured integration for one site/campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    /// Opaque token embedded in the webhook URL.
    pub token: String,
    /// Owning site.
    pub site_id: SiteId,
    /// Campaign the connector's events feed.
    pub campaign_id: CampaignId,
    /// Provider id this connector accepts deliveries from.
    pub provider: String,
    /// Shared secret for HMAC signature verification, when the provider
    /// signs its deliveries. `None` disables the signature check.
    pub signing_secret: Option<String>,
    /// Site-configured mappings for the generic field-mapping adapter.
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
}
