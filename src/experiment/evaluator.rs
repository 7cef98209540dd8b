//! A/B test statistics and winner declaration.
//!
//! Confidence is a pooled two-proportion z-test between the control and
//! the best-performing challenger, mapped to a 0-100 scale via the normal
//! CDF: `confidence = (2 * phi(|z|) - 1) * 100`. It is recomputed from the
//! raw counters on every read and never stored.
//!
//! Once confidence reaches [`WINNER_THRESHOLD`] the leading variant is
//! pinned as the winner. The pin is set-once: later traffic can move the
//! numbers but never silently changes a declared winner. Only an explicit
//! restart clears it.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{EngineEvent, EventBus, ExperimentId, ExperimentState, Variant};
use crate::error::EngineError;
use crate::store::Store;

/// Confidence (0-100) at which a winner is auto-declared.
pub const WINNER_THRESHOLD: f64 = 95.0;

/// Computes the experiment's confidence on a 0-100 scale.
///
/// Returns `0.0` until both the control and at least one challenger have
/// views, and when the compared CTRs are exactly tied.
#[must_use]
pub fn confidence(state: &ExperimentState) -> f64 {
    let Some(control) = state.variants.iter().find(|v| v.is_control) else {
        return 0.0;
    };
    let Some(challenger) = best_challenger(state) else {
        return 0.0;
    };
    if control.views == 0 || challenger.views == 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let (x1, n1, x2, n2) = (
        control.clicks as f64,
        control.views as f64,
        challenger.clicks as f64,
        challenger.views as f64,
    );
    let pooled = (x1 + x2) / (n1 + n2);
    let variance = pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2);
    if variance <= 0.0 {
        return 0.0;
    }
    let z = ((x2 / n2) - (x1 / n1)).abs() / variance.sqrt();
    ((2.0 * phi(z) - 1.0) * 100.0).clamp(0.0, 100.0)
}

/// The non-control variant with the highest CTR, if any has traffic.
fn best_challenger(state: &ExperimentState) -> Option<&Variant> {
    state
        .variants
        .iter()
        .filter(|v| !v.is_control)
        .max_by(|a, b| a.ctr().total_cmp(&b.ctr()))
}

/// The variant currently ahead in the compared pair: the best challenger
/// when it out-performs the control, otherwise the control itself.
fn leading_variant(state: &ExperimentState) -> Option<&Variant> {
    let control = state.variants.iter().find(|v| v.is_control)?;
    let challenger = best_challenger(state)?;
    if challenger.ctr() > control.ctr() {
        Some(challenger)
    } else {
        Some(control)
    }
}

/// Standard normal CDF via the Abramowitz & Stegun erf approximation
/// (formula 7.1.26, max absolute error 1.5e-7).
fn phi(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Evaluator updating counters and declaring winners.
#[derive(Debug, Clone)]
pub struct ExperimentEvaluator {
    store: Arc<dyn Store>,
    event_bus: EventBus,
}

impl ExperimentEvaluator {
    /// Creates an evaluator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Records one view against a variant, then re-evaluates the winner.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn record_view(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        self.store.add_variant_view(experiment_id, variant_id).await?;
        self.maybe_declare_winner(experiment_id).await
    }

    /// Records one click against a variant, then re-evaluates the winner.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn record_click(
        &self,
        experiment_id: ExperimentId,
        variant_id: &str,
    ) -> Result<(), EngineError> {
        self.store.add_variant_click(experiment_id, variant_id).await?;
        self.maybe_declare_winner(experiment_id).await
    }

    /// Loads the experiment state together with its current confidence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn state_with_confidence(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<(ExperimentState, f64), EngineError> {
        let state = self
            .store
            .experiment(experiment_id)
            .await?
            .ok_or(EngineError::ExperimentNotFound(experiment_id.into()))?;
        let score = confidence(&state);
        Ok((state, score))
    }

    /// Pins the leading variant as winner once confidence reaches the
    /// threshold. A no-op when a winner is already pinned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn maybe_declare_winner(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<(), EngineError> {
        let (state, score) = self.state_with_confidence(experiment_id).await?;
        if state.winner_variant_id.is_some() || score < WINNER_THRESHOLD {
            return Ok(());
        }
        let Some(leader) = leading_variant(&state) else {
            return Ok(());
        };
        let now = Utc::now();
        if self
            .store
            .pin_winner(experiment_id, &leader.id, now)
            .await?
        {
            tracing::info!(
                experiment_id = %experiment_id,
                variant_id = %leader.id,
                confidence = score,
                "experiment winner declared"
            );
            self.event_bus.publish(EngineEvent::WinnerDeclared {
                experiment_id,
                variant_id: leader.id.clone(),
                confidence: score,
                timestamp: now,
            });
        }
        Ok(())
    }

    /// Locks in the declared winner permanently.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, [`EngineError::InvalidRule`] when no winner has been
    /// declared yet, or [`EngineError::StorageError`] on backend failure.
    pub async fn make_permanent(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<ExperimentState, EngineError> {
        let (mut state, _) = self.state_with_confidence(experiment_id).await?;
        if state.winner_variant_id.is_none() {
            return Err(EngineError::InvalidRule(
                "experiment has no declared winner yet".to_string(),
            ));
        }
        state.winner_permanent = true;
        self.store.upsert_experiment(state.clone()).await?;
        Ok(state)
    }

    /// Restarts the test: zeroes all counters and clears the winner.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for an unknown
    /// experiment, or [`EngineError::StorageError`] on backend failure.
    pub async fn restart(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<ExperimentState, EngineError> {
        let (state, _) = self.state_with_confidence(experiment_id).await?;
        let ids: Vec<(String, bool)> = state
            .variants
            .iter()
            .map(|v| (v.id.clone(), v.is_control))
            .collect();
        let borrowed: Vec<(&str, bool)> =
            ids.iter().map(|(id, c)| (id.as_str(), *c)).collect();
        let fresh = ExperimentState::new(experiment_id, &borrowed);
        self.store.upsert_experiment(fresh.clone()).await?;
        Ok(fresh)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn state(control: (u64, u64), challenger: (u64, u64)) -> ExperimentState {
        let mut s = ExperimentState::new(ExperimentId::new(), &[("Control", true), ("New", false)]);
        s.variants = vec![
            Variant {
                id: "Control".to_string(),
                is_control: true,
                views: control.0,
                clicks: control.1,
            },
            Variant {
                id: "New".to_string(),
                is_control: false,
                views: challenger.0,
                clicks: challenger.1,
            },
        ];
        s
    }

    async fn seeded() -> (Arc<dyn Store>, ExperimentEvaluator, ExperimentId) {
        let store: Arc<dyn Store> = Arc::new(crate::store::MemoryStore::new());
        let evaluator = ExperimentEvaluator::new(Arc::clone(&store), EventBus::new(16));
        let id = ExperimentId::new();
        let Ok(()) = store
            .upsert_experiment(ExperimentState::new(id, &[("Control", true), ("New", false)]))
            .await
        else {
            panic!("seed failed");
        };
        (store, evaluator, id)
    }

    #[test]
    fn no_traffic_means_zero_confidence() {
        assert!((confidence(&state((0, 0), (0, 0))) - 0.0).abs() < f64::EPSILON);
        assert!((confidence(&state((100, 10), (0, 0))) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tied_rates_mean_zero_confidence() {
        assert!(confidence(&state((500, 25), (500, 25))) < 0.01);
    }

    #[test]
    fn clear_lift_at_volume_is_decisive() {
        // 4% vs 8% CTR at 1000 views each: z is about 3.77.
        let score = confidence(&state((1000, 40), (1000, 80)));
        assert!(score > 99.9, "score was {score}");
        assert!(score <= 100.0);
    }

    #[test]
    fn confidence_grows_with_sample_size() {
        // Same 4% vs 8% split at a tenth of the traffic.
        let small = confidence(&state((100, 4), (100, 8)));
        let large = confidence(&state((1000, 40), (1000, 80)));
        assert!(small < large, "{small} vs {large}");
        assert!(small < WINNER_THRESHOLD);
    }

    #[tokio::test]
    async fn threshold_crossing_pins_the_leader() {
        let (store, evaluator, id) = seeded().await;

        // Load decisive counters directly, then trip the evaluation.
        let _ = store.upsert_experiment(with_id(id, (1000, 40), (1000, 79))).await;
        let Ok(()) = evaluator.record_click(id, "New").await else {
            panic!("record failed");
        };

        let Ok((after, score)) = evaluator.state_with_confidence(id).await else {
            panic!("state read failed");
        };
        assert!(score >= WINNER_THRESHOLD);
        assert_eq!(after.winner_variant_id.as_deref(), Some("New"));
        assert!(after.winner_declared_at.is_some());
        assert!(!after.winner_permanent);
    }

    #[tokio::test]
    async fn leading_control_is_pinned_not_the_challenger() {
        let (store, evaluator, id) = seeded().await;

        // The control is the one decisively ahead: 8.1% vs 4% CTR.
        let _ = store.upsert_experiment(with_id(id, (1000, 81), (1000, 40))).await;
        let Ok(()) = evaluator.record_click(id, "Control").await else {
            panic!("record failed");
        };

        let Ok((after, score)) = evaluator.state_with_confidence(id).await else {
            panic!("state read failed");
        };
        assert!(score >= WINNER_THRESHOLD, "score was {score}");
        assert_eq!(after.winner_variant_id.as_deref(), Some("Control"));
    }

    #[tokio::test]
    async fn declared_winner_survives_later_traffic() {
        let (store, evaluator, id) = seeded().await;
        let _ = store.upsert_experiment(with_id(id, (1000, 40), (1000, 79))).await;
        let _ = evaluator.record_click(id, "New").await;

        // Control surges afterwards; the pin must not move.
        for _ in 0..50 {
            let _ = evaluator.record_click(id, "Control").await;
        }
        let Ok((after, _)) = evaluator.state_with_confidence(id).await else {
            panic!("state read failed");
        };
        assert_eq!(after.winner_variant_id.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn make_permanent_requires_a_winner() {
        let (_, evaluator, id) = seeded().await;
        let result = evaluator.make_permanent(id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn restart_zeroes_counters_and_clears_the_winner() {
        let (store, evaluator, id) = seeded().await;
        let _ = store.upsert_experiment(with_id(id, (1000, 40), (1000, 79))).await;
        let _ = evaluator.record_click(id, "New").await;

        let Ok(fresh) = evaluator.restart(id).await else {
            panic!("restart failed");
        };
        assert!(fresh.winner_variant_id.is_none());
        assert!(!fresh.winner_permanent);
        assert!(fresh.variants.iter().all(|v| v.views == 0 && v.clicks == 0));
        assert_eq!(fresh.variants.len(), 2);
    }

    fn with_id(id: ExperimentId, control: (u64, u64), challenger: (u64, u64)) -> ExperimentState {
        let mut s = state(control, challenger);
        s.experiment_id = id;
        s
    }
}
