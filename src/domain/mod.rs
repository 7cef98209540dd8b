//! Domain layer: core types, identifiers, and the event system.
//!
//! This module contains the canonical event model, campaign targeting
//! configuration, weighting rows, bookkeeping records, experiment state,
//! and the broadcast bus for engine events.

pub mod campaign;
pub mod connector;
pub mod engine_event;
pub mod event;
pub mod event_bus;
pub mod experiment;
pub mod ids;
pub mod records;
pub mod visitor;
pub mod weight;

pub use campaign::{Audience, Campaign, DeviceClass, FrequencyCap, HourRange, Schedule};
pub use connector::{Connector, FieldMapping};
pub use engine_event::{EngineEvent, EvictionReason};
pub use event::{CanonicalEvent, RawProviderEvent};
pub use event_bus::EventBus;
pub use experiment::{ExperimentState, Variant};
pub use ids::{CampaignId, EventId, ExperimentId, SiteId};
pub use records::{IdempotencyRecord, VisitorExposure};
pub use visitor::VisitorContext;
pub use weight::NotificationWeight;
