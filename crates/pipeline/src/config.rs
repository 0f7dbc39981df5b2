//! Pipeline Configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `FATIGUE_<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use fatigue_classifier::TrainConfig;
use onset_eval::OnsetRule;
use rep_segmentation::SegmentationConfig;
use serde::{Deserialize, Serialize};
use signal_conditioner::ConditioningConfig;
use tracing::debug;

use crate::PipelineError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FATIGUE";

/// Input and artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `<id>.csv` recordings
    pub signals_dir: PathBuf,
    /// `;`-delimited label manifest
    pub manifest: PathBuf,
    /// EMG channel label to extract from each recording
    pub channel: String,
    /// Master dataset artifact
    pub dataset: PathBuf,
    /// Model bundle artifact
    pub bundle: PathBuf,
    /// Optional JSON evaluation report
    pub report: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            signals_dir: PathBuf::from("data/signals"),
            manifest: PathBuf::from("data/labels.csv"),
            channel: "Emg_1".to_string(),
            dataset: PathBuf::from("artifacts/master_dataset.csv"),
            bundle: PathBuf::from("artifacts/fatigue_model.bin"),
            report: None,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub conditioning: ConditioningConfig,
    pub segmentation: SegmentationConfig,
    pub training: TrainConfig,
    pub onset: OnsetRule,
}

impl PipelineConfig {
    /// Load defaults, the optional file at `path`, and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section that has constraints of its own
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.segmentation.validate()?;
        self.training.validate()?;
        self.onset.validate()?;
        if self.data.channel.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("data.channel is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.data.channel, "Emg_1");
        assert_eq!(config.conditioning.notch_freq, 50.0);
        assert_eq!(config.segmentation.distance_seconds, 2.0);
        assert_eq!(config.training.n_splits, 5);
        assert_eq!(config.training.threshold_grid.len(), 181);
        assert_eq!(config.onset, OnsetRule::m_of_n(2, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_keep_other_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[conditioning]\nnotch_freq = 60.0\n\n[training]\nn_splits = 3\n\n[onset]\nm = 3\nn = 4\n\n[data]\nchannel = \"Emg_2\""
        )
        .unwrap();

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.conditioning.notch_freq, 60.0);
        assert_eq!(config.conditioning.lowcut, 20.0);
        assert_eq!(config.training.n_splits, 3);
        assert_eq!(config.training.threshold_grid.len(), 181);
        assert_eq!(config.onset, OnsetRule::m_of_n(3, 4));
        assert_eq!(config.data.channel, "Emg_2");
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[training]\nn_splits = 1").unwrap();
        assert!(PipelineConfig::load(Some(file.path())).is_err());

        assert!(PipelineConfig::load(Some(Path::new("/nonexistent/pipeline.toml"))).is_err());
    }
}
