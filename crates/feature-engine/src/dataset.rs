//! Labeled Feature Rows and the Master Dataset

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::baseline::{AugmentedRep, DynamicFeatures};
use crate::features::RepFeatures;

/// Number of model input columns
pub const MODEL_FEATURE_DIMENSION: usize = 19;

/// Names of the derived columns, in [`DynamicFeatures::values`] order
pub const DYNAMIC_FEATURE_NAMES: [&str; 15] = [
    "rms_rel_base",
    "rms_delta_base",
    "median_frequency_rel_base",
    "median_frequency_delta_base",
    "envelope_peak_rel_base",
    "envelope_peak_delta_base",
    "rep_duration_rel_base",
    "rep_duration_delta_base",
    "rms_diff1",
    "rms_roll3_mean",
    "median_frequency_diff1",
    "median_frequency_roll3_mean",
    "envelope_peak_diff1",
    "envelope_peak_roll3_mean",
    "peak_time_diff1",
];

/// Names of the model input columns, in [`RepFeatureRow::model_inputs`] order
pub const MODEL_FEATURE_NAMES: [&str; MODEL_FEATURE_DIMENSION] = [
    "rms",
    "median_frequency",
    "envelope_peak",
    "rep_duration",
    "rms_rel_base",
    "rms_delta_base",
    "median_frequency_rel_base",
    "median_frequency_delta_base",
    "envelope_peak_rel_base",
    "envelope_peak_delta_base",
    "rep_duration_rel_base",
    "rep_duration_delta_base",
    "rms_diff1",
    "rms_roll3_mean",
    "median_frequency_diff1",
    "median_frequency_roll3_mean",
    "envelope_peak_diff1",
    "envelope_peak_roll3_mean",
    "peak_time_diff1",
];

/// Ground-truth label: a repetition is fatigued from the failure repetition on
pub fn label(rep_number: usize, failure_rep: usize) -> bool {
    rep_number >= failure_rep
}

/// One labeled repetition of one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepFeatureRow {
    pub file_id: String,
    pub features: RepFeatures,
    pub dynamics: DynamicFeatures,
    /// Annotated failure repetition of the recording
    pub failure_rep: usize,
    pub is_fatigued: bool,
}

impl RepFeatureRow {
    /// Repetition number
    pub fn rep(&self) -> usize {
        self.features.rep
    }

    /// Model input vector, in [`MODEL_FEATURE_NAMES`] order
    pub fn model_inputs(&self) -> [f64; MODEL_FEATURE_DIMENSION] {
        model_inputs(&self.features, &self.dynamics)
    }

    /// Whether every numeric column is finite
    pub fn is_finite(&self) -> bool {
        self.features.is_finite() && self.dynamics.values().iter().all(|v| v.is_finite())
    }
}

/// Model input vector for an unlabeled repetition
pub fn model_inputs(features: &RepFeatures, dynamics: &DynamicFeatures) -> [f64; MODEL_FEATURE_DIMENSION] {
    let mut out = [0.0; MODEL_FEATURE_DIMENSION];
    out[0] = features.rms;
    out[1] = features.median_frequency;
    out[2] = features.envelope_peak;
    out[3] = features.rep_duration;
    out[4..].copy_from_slice(&dynamics.values());
    out
}

/// Label the augmented repetitions of one recording
pub fn label_rows(file_id: &str, augmented: &[AugmentedRep], failure_rep: usize) -> Vec<RepFeatureRow> {
    augmented
        .iter()
        .map(|a| RepFeatureRow {
            file_id: file_id.to_string(),
            features: a.features,
            dynamics: a.dynamics,
            failure_rep,
            is_fatigued: label(a.features.rep, failure_rep),
        })
        .collect()
}

/// Every usable row across all recordings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterDataset {
    rows: Vec<RepFeatureRow>,
    dropped: usize,
}

impl MasterDataset {
    /// Collect rows, dropping any with a non-finite value or an empty file id
    pub fn from_rows(rows: impl IntoIterator<Item = RepFeatureRow>) -> Self {
        let mut kept = Vec::new();
        let mut dropped = 0;
        for row in rows {
            if row.file_id.is_empty() {
                warn!("Dropping rep {} with empty file id", row.rep());
                dropped += 1;
            } else if !row.is_finite() {
                warn!("Dropping non-finite feature row: {} rep {}", row.file_id, row.rep());
                dropped += 1;
            } else {
                kept.push(row);
            }
        }
        debug!("Master dataset: {} rows kept, {} dropped", kept.len(), dropped);
        Self { rows: kept, dropped }
    }

    /// All rows, in insertion order
    pub fn rows(&self) -> &[RepFeatureRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows removed while building the dataset
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Labels in row order
    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.is_fatigued).collect()
    }

    /// File ids in row order
    pub fn groups(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.file_id.clone()).collect()
    }

    /// Model inputs in row order
    pub fn model_inputs(&self) -> Vec<[f64; MODEL_FEATURE_DIMENSION]> {
        self.rows.iter().map(RepFeatureRow::model_inputs).collect()
    }

    /// Distinct file ids in order of first appearance
    pub fn file_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.file_id.as_str()) {
                seen.push(row.file_id.as_str());
            }
        }
        seen
    }
}
