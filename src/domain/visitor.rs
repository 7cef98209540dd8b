//! Visitor request context for targeting and selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::campaign::DeviceClass;

/// Everything the engine knows about one page-load selection request.
///
/// Built by the selection boundary from the widget's request; the engine
/// never infers any of these fields itself (geo/device detection is a
/// collaborator concern upstream of this struct).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorContext {
    /// Durable visitor identifier (first-party cookie).
    pub visitor_id: String,
    /// Session identifier, rotated per browser session.
    pub session_id: String,
    /// Full URL of the page the widget is embedded in.
    pub url: String,
    /// ISO country code, when geo resolution succeeded upstream.
    pub country: Option<String>,
    /// Device class reported by the widget.
    pub device: DeviceClass,
    /// Request time. Taken as a field so tests can pin the clock.
    pub now: DateTime<Utc>,
}
