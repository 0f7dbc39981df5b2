//! Onset Timing Evaluation
//!
//! Applies an [`OnsetRule`] to the out-of-fold probabilities of each
//! recording and compares the declared onset repetition with the labeled
//! failure repetition.

use std::collections::BTreeMap;

use feature_engine::RepFeatureRow;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rule::OnsetRule;
use crate::OnsetError;

/// Onset decision for one recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnsetCall {
    pub file_id: String,
    pub ground_truth_rep: usize,
    pub predicted_onset_rep: Option<usize>,
    /// `predicted - ground_truth`; negative means early
    pub timing_error: Option<i64>,
}

/// Aggregate timing statistics over recordings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub n_files: usize,
    pub n_with_prediction: usize,
    pub n_no_prediction: usize,
    pub fraction_no_prediction: f64,
    pub mean_error: Option<f64>,
    pub median_error: Option<f64>,
    pub mean_abs_error: Option<f64>,
}

impl TimingSummary {
    /// Summarize a set of calls
    pub fn from_calls(calls: &[OnsetCall]) -> Self {
        let mut errors: Vec<i64> = calls.iter().filter_map(|c| c.timing_error).collect();
        errors.sort_unstable();

        let n_files = calls.len();
        let n_with_prediction = errors.len();
        let n_no_prediction = n_files - n_with_prediction;

        let (mean_error, median_error, mean_abs_error) = if errors.is_empty() {
            (None, None, None)
        } else {
            let n = errors.len() as f64;
            let mean = errors.iter().sum::<i64>() as f64 / n;
            let mae = errors.iter().map(|e| e.abs()).sum::<i64>() as f64 / n;
            let mid = errors.len() / 2;
            let median = if errors.len() % 2 == 0 {
                (errors[mid - 1] + errors[mid]) as f64 / 2.0
            } else {
                errors[mid] as f64
            };
            (Some(mean), Some(median), Some(mae))
        };

        Self {
            n_files,
            n_with_prediction,
            n_no_prediction,
            fraction_no_prediction: if n_files == 0 {
                0.0
            } else {
                n_no_prediction as f64 / n_files as f64
            },
            mean_error,
            median_error,
            mean_abs_error,
        }
    }
}

/// Per-recording calls with their summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvaluation {
    pub calls: Vec<OnsetCall>,
    pub summary: TimingSummary,
}

/// Onset repetition for one recording given `(rep, probability)` pairs in
/// any order. Non-finite probabilities never count as hits.
pub fn detect_onset(scored: &[(usize, f64)], threshold: f64, rule: &OnsetRule) -> Option<usize> {
    let mut sorted = scored.to_vec();
    sorted.sort_by_key(|&(rep, _)| rep);
    let hits: Vec<bool> = sorted.iter().map(|&(_, p)| p >= threshold).collect();
    rule.detect(&hits).map(|k| sorted[k].0)
}

/// Annotated failure repetition of each recording, as carried on its rows.
/// The first row seen for a recording wins.
pub fn ground_truth_by_file(rows: &[RepFeatureRow]) -> BTreeMap<String, usize> {
    let mut out: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        out.entry(row.file_id.clone()).or_insert(row.failure_rep);
    }
    out
}

/// Evaluate onset timing for every recording in `rows`.
///
/// `proba[i]` is the out-of-fold probability of `rows[i]`. Recordings are
/// reported in order of first appearance.
pub fn evaluate_onset_timing(
    rows: &[RepFeatureRow],
    proba: &[f64],
    threshold: f64,
    rule: &OnsetRule,
    ground_truth: &BTreeMap<String, usize>,
) -> Result<OnsetEvaluation, OnsetError> {
    rule.validate()?;
    if rows.len() != proba.len() {
        return Err(OnsetError::LengthMismatch {
            rows: rows.len(),
            proba: proba.len(),
        });
    }

    let mut order: Vec<&str> = Vec::new();
    let mut per_file: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
    for (row, &p) in rows.iter().zip(proba) {
        let entry = per_file.entry(row.file_id.as_str()).or_insert_with(|| {
            order.push(row.file_id.as_str());
            Vec::new()
        });
        entry.push((row.rep(), p));
    }

    let mut calls = Vec::with_capacity(order.len());
    for file_id in order {
        let truth = *ground_truth
            .get(file_id)
            .ok_or_else(|| OnsetError::MissingGroundTruth(file_id.to_string()))?;
        let predicted = detect_onset(&per_file[file_id], threshold, rule);
        let timing_error = predicted.map(|p| p as i64 - truth as i64);
        debug!(
            "{}: onset {:?}, failure rep {}, error {:?}",
            file_id, predicted, truth, timing_error
        );
        calls.push(OnsetCall {
            file_id: file_id.to_string(),
            ground_truth_rep: truth,
            predicted_onset_rep: predicted,
            timing_error,
        });
    }

    let summary = TimingSummary::from_calls(&calls);
    info!(
        "Onset timing over {} files: {} predicted, MAE {:?}",
        summary.n_files, summary.n_with_prediction, summary.mean_abs_error
    );
    Ok(OnsetEvaluation { calls, summary })
}
