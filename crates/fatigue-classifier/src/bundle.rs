//! Trained Model Bundle
//!
//! Everything single-file inference needs without retraining: the fitted
//! model, its operating threshold, and the conditioning, segmentation and
//! onset parameters used while building the training set.

use chrono::{DateTime, Utc};
use feature_engine::{MasterDataset, MODEL_FEATURE_DIMENSION, MODEL_FEATURE_NAMES};
use onset_eval::OnsetRule;
use rep_segmentation::SegmentationConfig;
use serde::{Deserialize, Serialize};
use signal_conditioner::ConditioningConfig;
use tracing::info;

use crate::engine::train_final_model;
use crate::logistic::LogisticConfig;
use crate::model::{feature_matrix, FatigueModel};
use crate::ClassifierError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model: FatigueModel,
    /// Out-of-fold operating threshold
    pub threshold: f64,
    pub feature_names: Vec<String>,
    pub conditioning: ConditioningConfig,
    pub segmentation: SegmentationConfig,
    pub onset_rule: OnsetRule,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub training_files: usize,
}

/// Parameters carried into a bundle alongside the model
#[derive(Debug, Clone, Default)]
pub struct BundleParams {
    pub conditioning: ConditioningConfig,
    pub segmentation: SegmentationConfig,
    pub onset_rule: OnsetRule,
}

impl ModelBundle {
    /// Fit the production model on the whole dataset and bundle it with the
    /// threshold chosen out of fold
    pub fn train(
        dataset: &MasterDataset,
        threshold: f64,
        logistic: &LogisticConfig,
        params: BundleParams,
    ) -> Result<Self, ClassifierError> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ClassifierError::InvalidConfig(format!(
                "threshold {} lies outside (0, 1)",
                threshold
            )));
        }
        let (model, _) = train_final_model(dataset, logistic)?;
        let bundle = Self {
            model,
            threshold,
            feature_names: MODEL_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            conditioning: params.conditioning,
            segmentation: params.segmentation,
            onset_rule: params.onset_rule,
            trained_at: Utc::now(),
            training_rows: dataset.len(),
            training_files: dataset.file_ids().len(),
        };
        info!(
            "Bundled model trained on {} rows from {} files, threshold {:.3}",
            bundle.training_rows, bundle.training_files, bundle.threshold
        );
        Ok(bundle)
    }

    /// Check that the bundle matches this build's feature layout
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.model.n_features() != MODEL_FEATURE_DIMENSION {
            return Err(ClassifierError::IncompatibleBundle(format!(
                "model expects {} features, this build produces {}",
                self.model.n_features(),
                MODEL_FEATURE_DIMENSION
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(MODEL_FEATURE_NAMES.iter().copied()) {
            return Err(ClassifierError::IncompatibleBundle(
                "feature names differ from this build".to_string(),
            ));
        }
        Ok(())
    }

    /// Class-1 probability for each repetition's model inputs
    pub fn predict_proba(
        &self,
        inputs: &[[f64; MODEL_FEATURE_DIMENSION]],
    ) -> Result<Vec<f64>, ClassifierError> {
        self.model.predict_proba(feature_matrix(inputs).view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::{add_baseline_features, label_rows, RepFeatures};

    fn dataset() -> MasterDataset {
        let mut rows = Vec::new();
        for (f, failure) in [(0, 5), (1, 4), (2, 6)] {
            let reps: Vec<RepFeatures> = (2..=8)
                .map(|k| RepFeatures {
                    rep: k,
                    start: k * 1000,
                    end: k * 1000 + 800,
                    peak_index: k * 1000 + 400,
                    peak_time: k as f64 * 2.5,
                    rms: 0.5 + if k >= failure { 0.3 * (k - failure + 1) as f64 } else { 0.0 } + 0.01 * f as f64,
                    median_frequency: 120.0 - if k >= failure { 8.0 * (k - failure + 1) as f64 } else { 0.0 },
                    envelope_peak: 0.4 + 0.05 * k as f64,
                    rep_duration: 800.0 + k as f64,
                })
                .collect();
            rows.extend(label_rows(&format!("s{}", f), &add_baseline_features(&reps), failure));
        }
        MasterDataset::from_rows(rows)
    }

    #[test]
    fn test_bundle_train_and_predict() {
        let data = dataset();
        let bundle = ModelBundle::train(&data, 0.5, &LogisticConfig::default(), BundleParams::default()).unwrap();
        assert!(bundle.validate().is_ok());
        assert_eq!(bundle.training_rows, 21);
        assert_eq!(bundle.training_files, 3);

        let proba = bundle.predict_proba(&data.model_inputs()).unwrap();
        let labels = data.labels();
        let mean = |want: bool| {
            let v: Vec<f64> = proba.iter().zip(&labels).filter(|(_, &l)| l == want).map(|(p, _)| *p).collect();
            v.iter().sum::<f64>() / v.len() as f64
        };
        assert!(mean(true) > mean(false));
    }

    #[test]
    fn test_threshold_out_of_range() {
        assert!(matches!(
            ModelBundle::train(&dataset(), 1.0, &LogisticConfig::default(), BundleParams::default()),
            Err(ClassifierError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_incompatible_feature_names() {
        let mut bundle =
            ModelBundle::train(&dataset(), 0.4, &LogisticConfig::default(), BundleParams::default()).unwrap();
        bundle.feature_names.swap(0, 1);
        assert!(matches!(bundle.validate(), Err(ClassifierError::IncompatibleBundle(_))));
    }
}
