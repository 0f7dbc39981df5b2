//! Single-Recording Inference
//!
//! Applies a saved [`ModelBundle`] to one raw channel: per-repetition
//! fatigue probabilities, the onset trigger under the bundle's rule, and
//! the model-free heuristic onset for comparison.

use fatigue_classifier::ModelBundle;
use feature_engine::{model_inputs, RepFeatures};
use onset_eval::{detect_onset, detect_optimal_rep, HeuristicOnset, DEFAULT_LOOKBACK};
use serde::Serialize;
use storage::{ChannelLookup, SignalSource};
use tracing::info;

use crate::recording::process_signal;
use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepPrediction {
    pub rep: usize,
    /// Seconds from the start of the recording
    pub peak_time: f64,
    pub probability: f64,
    pub is_fatigued: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub file_id: String,
    /// In repetition order
    pub predictions: Vec<RepPrediction>,
    /// Onset repetition under the bundle's rule
    pub trigger_rep: Option<usize>,
    pub heuristic: HeuristicOnset,
}

/// Score every repetition of one raw channel
pub fn predict_fatigue_on_emg(
    samples: &[f64],
    sampling_rate: f64,
    bundle: &ModelBundle,
    file_id: &str,
) -> Result<InferenceResult, PipelineError> {
    bundle.validate()?;
    let out = process_signal(samples, sampling_rate, &bundle.conditioning, &bundle.segmentation)?;

    let inputs: Vec<_> = out
        .reps
        .iter()
        .map(|a| model_inputs(&a.features, &a.dynamics))
        .collect();
    let proba = if inputs.is_empty() {
        Vec::new()
    } else {
        bundle.predict_proba(&inputs)?
    };

    let predictions: Vec<RepPrediction> = out
        .reps
        .iter()
        .zip(&proba)
        .map(|(a, &p)| RepPrediction {
            rep: a.features.rep,
            peak_time: a.features.peak_time,
            probability: p,
            is_fatigued: p >= bundle.threshold,
        })
        .collect();

    let scored: Vec<(usize, f64)> = predictions.iter().map(|p| (p.rep, p.probability)).collect();
    let trigger_rep = detect_onset(&scored, bundle.threshold, &bundle.onset_rule);
    let raw: Vec<RepFeatures> = out.reps.iter().map(|a| a.features).collect();
    let heuristic = detect_optimal_rep(&raw, DEFAULT_LOOKBACK);

    info!(
        "{}: {} reps scored, trigger {:?}, heuristic {:?} ({:?})",
        file_id,
        predictions.len(),
        trigger_rep,
        heuristic.rep,
        heuristic.reason
    );

    Ok(InferenceResult {
        file_id: file_id.to_string(),
        predictions,
        trigger_rep,
        heuristic,
    })
}

/// Load `channel` of `file_id` from `source` and score it
pub fn predict_file(
    source: &dyn SignalSource,
    file_id: &str,
    channel: &str,
    bundle: &ModelBundle,
) -> Result<InferenceResult, PipelineError> {
    match source.load(file_id, channel) {
        ChannelLookup::Found {
            samples,
            sampling_rate,
        } => predict_fatigue_on_emg(&samples, sampling_rate, bundle, file_id),
        other => Err(PipelineError::SignalUnavailable {
            file_id: file_id.to_string(),
            channel: channel.to_string(),
            reason: match other {
                ChannelLookup::Corrupt(reason) => reason,
                ChannelLookup::ChannelNotFound { available } => {
                    format!("channel not found, available: {}", available.join(", "))
                }
                lookup => lookup.reason().to_string(),
            },
        }),
    }
}
