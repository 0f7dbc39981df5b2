//! Fatigue Onset Decisions
//!
//! Turns per-repetition fatigue probabilities into a single onset
//! repetition per recording and measures how far that call lands from the
//! labeled failure repetition.

mod heuristic;
mod rule;
mod timing;

pub use heuristic::{detect_optimal_rep, HeuristicOnset, OnsetReason, DEFAULT_LOOKBACK, SCORE_FRACTION};
pub use rule::OnsetRule;
pub use timing::{
    detect_onset, evaluate_onset_timing, ground_truth_by_file, OnsetCall, OnsetEvaluation,
    TimingSummary,
};

use thiserror::Error;

/// Onset evaluation errors
#[derive(Debug, Error)]
pub enum OnsetError {
    #[error("Invalid onset rule: {0}")]
    InvalidRule(String),

    #[error("{rows} rows but {proba} probabilities")]
    LengthMismatch { rows: usize, proba: usize },

    #[error("No ground-truth failure rep for file {0}")]
    MissingGroundTruth(String),
}
