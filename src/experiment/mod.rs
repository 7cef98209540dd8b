//! A/B test evaluation.

pub mod evaluator;

pub use evaluator::{ExperimentEvaluator, WINNER_THRESHOLD, confidence};
