//! Ingestion pipeline: normalize → dedup → admit.
//!
//! Each inbound item flows through the stages in this module
//! independently; a failure in one item is logged and skipped, never
//! aborting a batch (polling fetches can deliver many items per page).
//! Orchestration lives in [`crate::service`].

pub mod dedup;
pub mod normalizer;
pub mod queue;

pub use dedup::DedupGuard;
pub use queue::{Admission, WeightedQueue};
