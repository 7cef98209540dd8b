//! Data Transfer Objects for REST request/response serialization.
//!
//! Identifiers cross the wire as plain UUID strings; normalized event
//! fields travel as a JSON object keyed by the canonical vocabulary
//! (`template.*`, `meta.*`).

pub mod experiment_dto;
pub mod select_dto;
pub mod stats_dto;
pub mod webhook_dto;
pub mod weights_dto;

pub use experiment_dto::*;
pub use select_dto::*;
pub use stats_dto::*;
pub use webhook_dto::*;
pub use weights_dto::*;
