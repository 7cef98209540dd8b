//! Provider adapters: raw inbound payloads → [`RawProviderEvent`]s.
//!
//! One adapter per provider family, all satisfying [`ProviderAdapter`] and
//! registered in an [`AdapterRegistry`] keyed by provider id. Adding a
//! provider means registering a new implementation — dispatch is open, not
//! a central switch. Polling-style providers additionally implement
//! [`PollSource`] so an external scheduler can page through their API.
//!
//! Failure policy: a payload that fails `validate` is rejected with
//! [`EngineError::MalformedPayload`] before any side effect. Missing
//! *optional* fields never error — adapters substitute documented defaults
//! (`"Someone"` for a missing name).

pub mod commerce;
pub mod forms;
pub mod mapped;
pub mod path;
pub mod payments;
pub mod reviews;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{FieldMapping, RawProviderEvent};
use crate::error::EngineError;

pub use commerce::CommerceAdapter;
pub use forms::FormsAdapter;
pub use mapped::MappedAdapter;
pub use payments::PaymentsAdapter;
pub use reviews::ReviewsAdapter;

/// Placeholder name used when a payload carries no usable customer name.
pub const ANONYMOUS_NAME: &str = "Someone";

/// Per-delivery context handed to adapters.
///
/// Carries the connector's site-configured field mappings; only the
/// generic [`MappedAdapter`] reads them.
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    /// Dotted-path extraction rules from the connector configuration.
    pub field_mappings: Vec<FieldMapping>,
}

/// Translation of one raw inbound payload into provider events.
pub trait ProviderAdapter: Send + Sync + fmt::Debug {
    /// Provider id this adapter is registered under.
    fn id(&self) -> &'static str;

    /// Canonical event type events from this adapter map to.
    fn canonical_event_type(&self) -> &'static str;

    /// Cheap shape check run before any processing.
    fn validate(&self, payload: &Value) -> bool;

    /// Extracts provider events from a validated payload.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedPayload`] when a *required* field is
    /// missing. Optional fields degrade to defaults instead.
    fn process(
        &self,
        ctx: &AdapterContext,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RawProviderEvent>, EngineError>;
}

/// One page of results from a polling-style provider.
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// Raw items on this page, each processed like a webhook body.
    pub items: Vec<Value>,
    /// Cursor for the next page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Paged fetch interface for polling-style providers.
///
/// Implementations own their HTTP client; the engine only sees pages. An
/// external cron-like trigger drives the paging via the sync endpoint.
#[async_trait]
pub trait PollSource: Send + Sync + fmt::Debug {
    /// Fetches one page of items starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] when the upstream API call fails.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<PageFetch, EngineError>;
}

/// Registry mapping provider ids to adapter implementations.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
    poll_sources: HashMap<&'static str, Arc<dyn PollSource>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all built-in adapters registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CommerceAdapter));
        registry.register(Arc::new(PaymentsAdapter));
        registry.register(Arc::new(FormsAdapter));
        registry.register(Arc::new(ReviewsAdapter));
        registry.register(Arc::new(MappedAdapter));
        registry
    }

    /// Registers an adapter under its own id.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Registers a poll source for a provider id.
    pub fn register_poll_source(&mut self, provider: &'static str, source: Arc<dyn PollSource>) {
        self.poll_sources.insert(provider, source);
    }

    /// Looks up the adapter for a provider id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProvider`] when no adapter is
    /// registered under `provider`.
    pub fn get(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>, EngineError> {
        self.adapters
            .get(provider)
            .cloned()
            .ok_or_else(|| EngineError::UnknownProvider(provider.to_string()))
    }

    /// Looks up the poll source for a provider id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProvider`] when no poll source is
    /// registered under `provider`.
    pub fn poll_source(&self, provider: &str) -> Result<Arc<dyn PollSource>, EngineError> {
        self.poll_sources
            .get(provider)
            .cloned()
            .ok_or_else(|| EngineError::UnknownProvider(provider.to_string()))
    }

    /// Returns the ids of all registered adapters, sorted.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.adapters.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Builds a display name from optional name parts with documented fallbacks.
///
/// Order: `first last` → `first` → email local part → [`ANONYMOUS_NAME`].
#[must_use]
pub fn display_name(first: Option<&str>, last: Option<&str>, email: Option<&str>) -> String {
    match (first, last) {
        (Some(f), Some(l)) if !f.is_empty() && !l.is_empty() => format!("{f} {l}"),
        (Some(f), _) if !f.is_empty() => f.to_string(),
        _ => email
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .map_or_else(|| ANONYMOUS_NAME.to_string(), str::to_string),
    }
}

/// Builds a human-readable location string from optional city/country parts.
#[must_use]
pub fn display_location(city: Option<&str>, country: Option<&str>) -> Option<String> {
    match (city, country) {
        (Some(c), Some(k)) if !c.is_empty() && !k.is_empty() => Some(format!("{c}, {k}")),
        (Some(c), _) if !c.is_empty() => Some(c.to_string()),
        (_, Some(k)) if !k.is_empty() => Some(k.to_string()),
        _ => None,
    }
}
