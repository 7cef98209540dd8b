//! Experiment admin DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ExperimentState, Variant};
use crate::experiment;

/// One variant with raw counters and derived CTR.
#[derive(Debug, Serialize, ToSchema)]
pub struct VariantDto {
    /// Variant identifier.
    pub id: String,
    /// Whether this is the control variant.
    pub is_control: bool,
    /// Display count.
    pub views: u64,
    /// Click count.
    pub clicks: u64,
    /// Click-through rate (0.0 with no views).
    pub ctr: f64,
}

impl From<&Variant> for VariantDto {
    fn from(v: &Variant) -> Self {
        Self {
            id: v.id.clone(),
            is_control: v.is_control,
            views: v.views,
            clicks: v.clicks,
            ctr: v.ctr(),
        }
    }
}

/// Experiment state with confidence computed at read time.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExperimentResponse {
    /// Experiment identifier.
    pub experiment_id: uuid::Uuid,
    /// Competing variants.
    pub variants: Vec<VariantDto>,
    /// Statistical confidence, 0-100.
    pub confidence: f64,
    /// Auto-declared winner, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_variant_id: Option<String>,
    /// When the winner was declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_declared_at: Option<DateTime<Utc>>,
    /// Whether the winner has been locked in permanently.
    pub winner_permanent: bool,
}

impl ExperimentResponse {
    /// Builds the response from a state snapshot and its confidence.
    #[must_use]
    pub fn from_state(state: &ExperimentState, confidence: f64) -> Self {
        Self {
            experiment_id: state.experiment_id.into(),
            variants: state.variants.iter().map(VariantDto::from).collect(),
            confidence,
            winner_variant_id: state.winner_variant_id.clone(),
            winner_declared_at: state.winner_declared_at,
            winner_permanent: state.winner_permanent,
        }
    }
}

/// Convenience for handlers that recompute confidence themselves.
impl From<&ExperimentState> for ExperimentResponse {
    fn from(state: &ExperimentState) -> Self {
        Self::from_state(state, experiment::confidence(state))
    }
}
