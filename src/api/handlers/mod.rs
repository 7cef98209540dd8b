//! REST endpoint handlers organized by resource.

pub mod experiments;
pub mod select;
pub mod stats;
pub mod system;
pub mod webhook;
pub mod weights;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(select::routes())
        .merge(stats::routes())
        .merge(weights::routes())
        .merge(experiments::routes())
        .merge(webhook::sync_routes())
}
