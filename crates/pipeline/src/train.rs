//! Training Stage
//!
//! Grouped cross-validation, onset timing on the out-of-fold
//! probabilities, and the production model fitted on every row.

use fatigue_classifier::{train_eval_dataset, BundleParams, EvaluationResult, ModelBundle};
use feature_engine::MasterDataset;
use onset_eval::{evaluate_onset_timing, ground_truth_by_file, OnsetEvaluation};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::PipelineError;

/// Everything the training stage produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub evaluation: EvaluationResult,
    pub onset: OnsetEvaluation,
    pub bundle: ModelBundle,
}

/// Train, evaluate and bundle.
///
/// Onset timing is scored against the failure repetition each row carries,
/// so recordings that fail before the first window or after the last one
/// keep their annotated value.
pub fn run_training(dataset: &MasterDataset, config: &PipelineConfig) -> Result<TrainingOutcome, PipelineError> {
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    config.validate()?;
    info!(
        "Training on {} rows from {} files",
        dataset.len(),
        dataset.file_ids().len()
    );

    let evaluation = train_eval_dataset(dataset, &config.training)?;
    for (fold, warning) in evaluation.warnings() {
        warn!("Fold {}: {:?}", fold, warning);
    }

    let truth = ground_truth_by_file(dataset.rows());
    let onset = evaluate_onset_timing(
        dataset.rows(),
        &evaluation.oof_proba,
        evaluation.threshold,
        &config.onset,
        &truth,
    )?;

    let bundle = ModelBundle::train(
        dataset,
        evaluation.threshold,
        &config.training.logistic,
        BundleParams {
            conditioning: config.conditioning.clone(),
            segmentation: config.segmentation.clone(),
            onset_rule: config.onset,
        },
    )?;

    Ok(TrainingOutcome {
        evaluation,
        onset,
        bundle,
    })
}
