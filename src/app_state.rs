//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::EngineService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Engine facade for all business logic.
    pub engine: Arc<EngineService>,
    /// Event bus for in-process observers.
    pub event_bus: EventBus,
}
