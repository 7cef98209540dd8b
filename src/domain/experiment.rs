//! A/B test state: variants, counters, and the pinned winner.
//!
//! Confidence is *not* stored here — it is recomputed from the counters on
//! every read by the experiment evaluator, so it can never go stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ExperimentId;

/// One variant of an A/B test and its raw counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant identifier ("Control", "New", ...).
    pub id: String,
    /// Whether this is the control variant.
    pub is_control: bool,
    /// Times this variant was displayed.
    pub views: u64,
    /// Times this variant was clicked.
    pub clicks: u64,
}

impl Variant {
    /// Click-through rate, 0.0 when the variant has no views yet.
    #[must_use]
    pub fn ctr(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.clicks as f64 / self.views as f64
            }
        }
    }
}

/// Persistent state of one A/B test.
///
/// Invariant: once `winner_variant_id` is set it is never silently changed.
/// Only an explicit "make permanent" or a test restart clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentState {
    /// Experiment identifier.
    pub experiment_id: ExperimentId,
    /// Competing variants with their counters.
    pub variants: Vec<Variant>,
    /// Auto-declared winner, if confidence reached the threshold.
    pub winner_variant_id: Option<String>,
    /// When the winner was declared.
    pub winner_declared_at: Option<DateTime<Utc>>,
    /// Whether the winner was made permanent by the merchant.
    pub winner_permanent: bool,
}

impl ExperimentState {
    /// Creates a fresh experiment with zeroed counters.
    #[must_use]
    pub fn new(experiment_id: ExperimentId, variant_ids: &[(&str, bool)]) -> Self {
        Self {
            experiment_id,
            variants: variant_ids
                .iter()
                .map(|(id, is_control)| Variant {
                    id: (*id).to_string(),
                    is_control: *is_control,
                    views: 0,
                    clicks: 0,
                })
                .collect(),
            winner_variant_id: None,
            winner_declared_at: None,
            winner_permanent: false,
        }
    }

    /// Looks up a variant by id.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctr_handles_zero_views() {
        let v = Variant {
            id: "Control".to_string(),
            is_control: true,
            views: 0,
            clicks: 0,
        };
        assert!((v.ctr() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn new_experiment_has_zeroed_counters() {
        let state = ExperimentState::new(ExperimentId::new(), &[("Control", true), ("New", false)]);
        assert_eq!(state.variants.len(), 2);
        assert!(state.winner_variant_id.is_none());
        assert_eq!(state.variant("New").map(|v| v.views), Some(0));
    }
}
