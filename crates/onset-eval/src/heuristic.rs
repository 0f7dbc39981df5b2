//! Unsupervised Onset Estimate
//!
//! Scores each repetition by its normalized RMS minus the normalized median
//! frequency read back to front, then picks the first repetition whose
//! score crosses a fraction of the maximum.

use feature_engine::RepFeatures;
use serde::{Deserialize, Serialize};

/// Fraction of the maximum score that marks a candidate
pub const SCORE_FRACTION: f64 = 0.4;

/// Default number of leading repetitions skipped when possible
pub const DEFAULT_LOOKBACK: usize = 2;

const NORM_EPS: f64 = 1e-8;

/// How the heuristic reached its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnsetReason {
    /// First candidate at or after the lookback position
    ThresholdCross,
    /// Every candidate lies inside the lookback; the first one is used
    ThresholdCrossEarly,
    /// No score reached the threshold; the arg-max is used
    MaxScore,
    NoReps,
}

/// Heuristic onset repetition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicOnset {
    pub rep: Option<usize>,
    pub reason: OnsetReason,
}

fn min_max(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().cloned().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    values.iter().map(|v| (v - min) / (max - min + NORM_EPS)).collect()
}

/// Estimate the onset repetition from raw per-rep features, taken in the
/// given order
pub fn detect_optimal_rep(reps: &[RepFeatures], lookback: usize) -> HeuristicOnset {
    if reps.is_empty() {
        return HeuristicOnset {
            rep: None,
            reason: OnsetReason::NoReps,
        };
    }

    let rms = min_max(&reps.iter().map(|r| r.rms).collect::<Vec<_>>());
    let mdf = min_max(&reps.iter().map(|r| r.median_frequency).collect::<Vec<_>>());
    // Median frequency is paired in reverse rep order
    let score: Vec<f64> = rms.iter().zip(mdf.iter().rev()).map(|(r, m)| r - m).collect();

    let max_score = score
        .iter()
        .cloned()
        .filter(|s| !s.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    let threshold = SCORE_FRACTION * max_score;
    let candidates: Vec<usize> = (0..score.len()).filter(|&i| score[i] >= threshold).collect();

    let (index, reason) = match candidates.iter().find(|&&i| i >= lookback) {
        Some(&i) => (i, OnsetReason::ThresholdCross),
        None => match candidates.first() {
            Some(&i) => (i, OnsetReason::ThresholdCrossEarly),
            None => {
                let argmax = (0..score.len())
                    .filter(|&i| !score[i].is_nan())
                    .fold(0, |best, i| if score[i] > score[best] || score[best].is_nan() { i } else { best });
                (argmax, OnsetReason::MaxScore)
            }
        },
    };

    HeuristicOnset {
        rep: Some(reps[index].rep),
        reason,
    }
}
