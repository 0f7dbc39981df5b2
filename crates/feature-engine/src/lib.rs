//! Feature Engineering Engine
//!
//! Per-repetition amplitude and spectral features for EMG fatigue
//! classification:
//! - RMS and Welch median frequency of the notched signal
//! - envelope peak, peak time, and window duration
//! - baseline-relative and short-horizon dynamic columns
//! - the ground-truth labeling rule and the master dataset

mod baseline;
mod dataset;
mod features;
mod fft;
mod statistics;

pub use baseline::{
    add_baseline_features, AugmentedRep, Baseline, DynamicFeatures, BASELINE_EPS, BASELINE_REPS,
};
pub use dataset::{
    label, label_rows, model_inputs, MasterDataset, RepFeatureRow, DYNAMIC_FEATURE_NAMES,
    MODEL_FEATURE_DIMENSION, MODEL_FEATURE_NAMES,
};
pub use features::{extract, FeatureExtractor, RepFeatures};
pub use fft::{FftAnalyzer, PowerSpectrum};
pub use statistics::{rms, trailing_mean};

use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Window [{start}, {end}) with peak {peak_index} out of bounds for {len} samples")]
    WindowOutOfBounds {
        start: usize,
        end: usize,
        peak_index: usize,
        len: usize,
    },
    #[error("Time axis has {time_axis} samples, signal has {signal}")]
    TimeAxisMismatch { signal: usize, time_axis: usize },
}
