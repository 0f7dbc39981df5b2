//! EMG Fatigue Pipeline
//!
//! Orchestrates the batch stages over a labeled recording collection:
//! - build the master dataset from every recording in the manifest
//! - grouped cross-validated training, threshold selection and onset timing
//! - console and JSON reporting
//! - single-recording inference from a saved model bundle

pub mod batch;
pub mod config;
pub mod inference;
pub mod recording;
pub mod report;
pub mod train;

#[cfg(test)]
mod synthetic;

pub use batch::{build_master_dataset, BatchResult, BatchSettings, FileReport, FileStatus, SkipReason};
pub use crate::config::{DataConfig, PipelineConfig, ENV_PREFIX};
pub use inference::{predict_fatigue_on_emg, predict_file, InferenceResult, RepPrediction};
pub use recording::{process_signal, RecordingFeatures};
pub use report::{ConsoleReporter, JsonReporter, Reporter, TrainingReport};
pub use train::{run_training, TrainingOutcome};

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storage::{LabelManifest, SignalSource};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Conditioning error: {0}")]
    Conditioning(#[from] signal_conditioner::ConditioningError),

    #[error("Segmentation error: {0}")]
    Segmentation(#[from] rep_segmentation::SegmentationError),

    #[error("Feature error: {0}")]
    Feature(#[from] feature_engine::FeatureError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] fatigue_classifier::ClassifierError),

    #[error("Onset evaluation error: {0}")]
    Onset(#[from] onset_eval::OnsetError),

    #[error("Master dataset is empty")]
    EmptyDataset,

    #[error("Signal {channel} of {file_id} unavailable: {reason}")]
    SignalUnavailable {
        file_id: String,
        channel: String,
        reason: String,
    },

    #[error("Report error: {0}")]
    Report(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str, json: bool) -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PipelineError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}

/// Build the master dataset from `source` and train on it
pub async fn run_pipeline(
    source: Arc<dyn SignalSource>,
    manifest: &LabelManifest,
    config: &PipelineConfig,
) -> Result<(BatchResult, TrainingOutcome), PipelineError> {
    let settings = BatchSettings::from_config(config);
    let batch = build_master_dataset(source, manifest, &settings).await?;
    info!(
        "Master dataset: {} rows from {} files",
        batch.dataset.len(),
        batch.processed()
    );
    let outcome = run_training(&batch.dataset, config)?;
    Ok((batch, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRecording;
    use storage::{InMemorySignalSource, ManifestEntry, Recording};

    fn source_and_manifest() -> (Arc<dyn SignalSource>, LabelManifest) {
        let mut source = InMemorySignalSource::new();
        let mut entries = Vec::new();
        for (i, id) in ["subject_a", "subject_b", "subject_c"].iter().enumerate() {
            let samples = SyntheticRecording::new(7, 4)
                .with_seed(11 + i as u64)
                .samples();
            source.insert(
                id,
                Recording::single("Emg_1", samples, SyntheticRecording::SAMPLING_RATE),
            );
            entries.push(ManifestEntry {
                id: id.to_string(),
                failure_rep: Some(4),
            });
        }
        entries.push(ManifestEntry {
            id: "missing".to_string(),
            failure_rep: Some(3),
        });
        (Arc::new(source), LabelManifest::new(entries))
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.training.n_splits = 3;
        config
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let (source, manifest) = source_and_manifest();
        let (batch, outcome) = run_pipeline(source, &manifest, &config()).await.unwrap();

        // 7 bursts -> reps 2..=6 per recording
        assert_eq!(batch.processed(), 3);
        assert_eq!(batch.skipped(), 1);
        assert_eq!(batch.dataset.len(), 15);
        assert_eq!(batch.dataset.file_ids(), vec!["subject_a", "subject_b", "subject_c"]);

        let evaluation = &outcome.evaluation;
        assert_eq!(evaluation.oof_proba.len(), 15);
        assert!(evaluation.oof_proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(evaluation.threshold > 0.0 && evaluation.threshold < 1.0);
        assert_eq!(evaluation.confusion.total(), 15);
        assert_eq!(evaluation.folds.len(), 3);

        assert_eq!(outcome.onset.calls.len(), 3);
        assert!(outcome.onset.calls.iter().all(|c| c.ground_truth_rep == 4));
        assert_eq!(outcome.bundle.training_files, 3);
        assert_eq!(outcome.bundle.threshold, evaluation.threshold);
    }

    #[tokio::test]
    async fn test_nothing_usable_is_an_error() {
        let manifest = LabelManifest::new(vec![ManifestEntry {
            id: "ghost".to_string(),
            failure_rep: Some(3),
        }]);
        let source: Arc<dyn SignalSource> = Arc::new(InMemorySignalSource::new());
        let err = run_pipeline(source, &manifest, &config()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset));
    }
}
