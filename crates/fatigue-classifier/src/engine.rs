//! Grouped Cross-Validated Training
//!
//! Each fold fits a fresh [`FatigueModel`] on its training recordings and
//! scores the held-out recordings. The out-of-fold probabilities drive
//! threshold selection and every reported metric.

use std::collections::BTreeSet;

use feature_engine::MasterDataset;
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cv::group_k_fold;
use crate::logistic::{FitReport, LogisticConfig};
use crate::metrics::{
    apply_threshold, average_precision, roc_auc, ClassificationReport, ConfusionMatrix,
};
use crate::model::{feature_matrix, FatigueModel};
use crate::threshold::{default_threshold_grid, select_threshold, sweep_thresholds, ThresholdPoint};
use crate::ClassifierError;

/// Cross-validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of grouped folds
    pub n_splits: usize,
    /// Candidate thresholds, strictly increasing inside (0, 1)
    pub threshold_grid: Vec<f64>,
    pub logistic: LogisticConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            threshold_grid: default_threshold_grid(),
            logistic: LogisticConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.n_splits < 2 {
            return Err(ClassifierError::InvalidConfig(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.threshold_grid.is_empty() {
            return Err(ClassifierError::InvalidConfig("threshold grid is empty".to_string()));
        }
        if let Some(t) = self.threshold_grid.iter().find(|&&t| !(t > 0.0 && t < 1.0)) {
            return Err(ClassifierError::InvalidConfig(format!(
                "threshold {} lies outside (0, 1)",
                t
            )));
        }
        if self.threshold_grid.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ClassifierError::InvalidConfig(
                "threshold grid must be strictly increasing".to_string(),
            ));
        }
        self.logistic.validate()
    }
}

/// Non-fatal fold conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldWarning {
    /// Training rows hold one class; held-out rows get that class's prior
    SingleClassTraining { class: bool },
    /// Held-out rows hold one class
    SingleClassValidation { class: bool },
    /// Solver hit its iteration cap; its last coefficients were used
    NotConverged { iterations: usize },
}

/// What happened in one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldDiagnostics {
    pub fold: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub train_groups: Vec<String>,
    pub validation_groups: Vec<String>,
    /// `None` when no model was fitted
    pub fit: Option<FitReport>,
    pub warnings: Vec<FoldWarning>,
}

/// Out-of-fold evaluation of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// One probability per input row, in input order
    pub oof_proba: Vec<f64>,
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub balanced_accuracy: f64,
    /// `None` when the labels hold one class
    pub roc_auc: Option<f64>,
    /// `None` when the labels hold one class
    pub average_precision: Option<f64>,
    pub report: ClassificationReport,
    pub sweep: Vec<ThresholdPoint>,
    pub folds: Vec<FoldDiagnostics>,
}

impl EvaluationResult {
    /// Thresholded out-of-fold predictions
    pub fn predictions(&self) -> Vec<bool> {
        apply_threshold(&self.oof_proba, self.threshold)
    }

    /// Every fold warning, tagged with its fold
    pub fn warnings(&self) -> Vec<(usize, FoldWarning)> {
        self.folds
            .iter()
            .flat_map(|f| f.warnings.iter().map(move |w| (f.fold, *w)))
            .collect()
    }
}

fn group_names<S: AsRef<str>>(groups: &[S], rows: &[usize]) -> Vec<String> {
    rows.iter()
        .map(|&i| groups[i].as_ref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn single_class(y: &[bool]) -> Option<bool> {
    match y.first() {
        Some(&first) if y.iter().all(|&v| v == first) => Some(first),
        _ => None,
    }
}

/// Grouped K-fold training and out-of-fold evaluation.
///
/// `x` is rows x features, `y` the fatigue labels and `groups` the source
/// recording of each row. No row is ever scored by a model that saw its own
/// recording.
pub fn train_eval<S: AsRef<str>>(
    x: ArrayView2<f64>,
    y: &[bool],
    groups: &[S],
    config: &TrainConfig,
) -> Result<EvaluationResult, ClassifierError> {
    config.validate()?;
    let n = x.nrows();
    if n == 0 {
        return Err(ClassifierError::EmptyInput);
    }
    if y.len() != n {
        return Err(ClassifierError::LengthMismatch { rows: n, labels: y.len() });
    }
    if groups.len() != n {
        return Err(ClassifierError::GroupMismatch { rows: n, groups: groups.len() });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::NonFiniteInput);
    }

    let folds = group_k_fold(groups, config.n_splits)?;
    info!(
        "Training {} folds over {} rows ({} positive)",
        folds.len(),
        n,
        y.iter().filter(|&&v| v).count()
    );

    let mut oof_proba = vec![f64::NAN; n];
    let mut diagnostics = Vec::with_capacity(folds.len());

    for fold in &folds {
        let y_train: Vec<bool> = fold.train.iter().map(|&i| y[i]).collect();
        let y_val: Vec<bool> = fold.validation.iter().map(|&i| y[i]).collect();
        let x_val = x.select(Axis(0), &fold.validation);

        let mut warnings = Vec::new();
        let (proba, fit) = match single_class(&y_train) {
            Some(class) => {
                warn!(
                    "Fold {}: training rows are all {}, predicting the class prior",
                    fold.index,
                    if class { "fatigued" } else { "non-fatigued" }
                );
                warnings.push(FoldWarning::SingleClassTraining { class });
                let prior = if class { 1.0 } else { 0.0 };
                (vec![prior; fold.validation.len()], None)
            }
            None => {
                let x_train = x.select(Axis(0), &fold.train);
                let (model, report) = FatigueModel::fit(x_train.view(), &y_train, &config.logistic)?;
                if !report.converged {
                    warn!(
                        "Fold {}: solver stopped after {} iterations without converging",
                        fold.index, report.iterations
                    );
                    warnings.push(FoldWarning::NotConverged {
                        iterations: report.iterations,
                    });
                }
                (model.predict_proba(x_val.view())?, Some(report))
            }
        };

        if let Some(class) = single_class(&y_val) {
            debug!("Fold {}: held-out rows are all one class", fold.index);
            warnings.push(FoldWarning::SingleClassValidation { class });
        }

        for (&row, p) in fold.validation.iter().zip(proba) {
            oof_proba[row] = p;
        }

        diagnostics.push(FoldDiagnostics {
            fold: fold.index,
            train_rows: fold.train.len(),
            validation_rows: fold.validation.len(),
            train_groups: group_names(groups, &fold.train),
            validation_groups: group_names(groups, &fold.validation),
            fit,
            warnings,
        });
    }

    let sweep = sweep_thresholds(y, &oof_proba, &config.threshold_grid);
    let best = select_threshold(&sweep)
        .ok_or_else(|| ClassifierError::InvalidConfig("threshold grid is empty".to_string()))?;

    let confusion = ConfusionMatrix::from_predictions(y, &apply_threshold(&oof_proba, best.threshold));
    let result = EvaluationResult {
        threshold: best.threshold,
        balanced_accuracy: confusion.balanced_accuracy(),
        roc_auc: roc_auc(y, &oof_proba),
        average_precision: average_precision(y, &oof_proba),
        report: ClassificationReport::from_confusion(&confusion),
        confusion,
        sweep,
        folds: diagnostics,
        oof_proba,
    };

    info!(
        "OOF threshold {:.3}: balanced accuracy {:.3}, ROC-AUC {:?}, PR-AUC {:?}",
        result.threshold, result.balanced_accuracy, result.roc_auc, result.average_precision
    );
    Ok(result)
}

/// [`train_eval`] over a master dataset, grouped by file id
pub fn train_eval_dataset(
    dataset: &MasterDataset,
    config: &TrainConfig,
) -> Result<EvaluationResult, ClassifierError> {
    let x = feature_matrix(&dataset.model_inputs());
    train_eval(x.view(), &dataset.labels(), &dataset.groups(), config)
}

/// Fit the production model on every row of the dataset
pub fn train_final_model(
    dataset: &MasterDataset,
    config: &LogisticConfig,
) -> Result<(FatigueModel, FitReport), ClassifierError> {
    let x = feature_matrix(&dataset.model_inputs());
    let (model, report) = FatigueModel::fit(x.view(), &dataset.labels(), config)?;
    if !report.converged {
        warn!(
            "Final model stopped after {} iterations without converging",
            report.iterations
        );
    }
    info!("Final model fitted on {} rows", dataset.len());
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::collections::BTreeSet;

    /// Four groups of six rows; the label follows the first column
    fn grouped_data() -> (Array2<f64>, Vec<bool>, Vec<String>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        let mut groups = Vec::new();
        for g in 0..4 {
            for k in 0..6 {
                let level = k as f64 + 0.1 * g as f64;
                rows.push([level, (k as f64 * 1.7 + g as f64).sin()]);
                y.push(k >= 3);
                groups.push(format!("file{}", g));
            }
        }
        let x = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        (x, y, groups)
    }

    fn config(n_splits: usize) -> TrainConfig {
        TrainConfig {
            n_splits,
            ..Default::default()
        }
    }

    #[test]
    fn test_train_eval_out_of_fold() {
        let (x, y, groups) = grouped_data();
        let result = train_eval(x.view(), &y, &groups, &config(4)).unwrap();

        assert_eq!(result.oof_proba.len(), y.len());
        assert!(result.oof_proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(result.sweep.len(), 181);
        assert!(result.balanced_accuracy > 0.9);
        assert!(result.roc_auc.unwrap() > 0.9);
        assert!(result.average_precision.unwrap() > 0.9);
        assert_eq!(result.confusion.total(), y.len());
        assert!(result.warnings().is_empty());

        let best = result
            .sweep
            .iter()
            .map(|p| p.balanced_accuracy)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.balanced_accuracy, best);
    }

    #[test]
    fn test_folds_never_share_groups() {
        let (x, y, groups) = grouped_data();
        let result = train_eval(x.view(), &y, &groups, &config(3)).unwrap();
        assert_eq!(result.folds.len(), 3);

        let mut held_out = BTreeSet::new();
        for fold in &result.folds {
            let train: BTreeSet<&String> = fold.train_groups.iter().collect();
            assert!(fold.validation_groups.iter().all(|g| !train.contains(g)));
            held_out.extend(fold.validation_groups.iter().cloned());
        }
        assert_eq!(held_out.len(), 4);
    }

    #[test]
    fn test_capped_solver_is_a_fold_warning() {
        let (x, y, groups) = grouped_data();
        let mut capped = config(4);
        capped.logistic = LogisticConfig {
            max_iter: 1,
            tol: 0.0,
            ..Default::default()
        };
        let result = train_eval(x.view(), &y, &groups, &capped).unwrap();

        let warnings = result.warnings();
        assert_eq!(warnings.len(), 4);
        assert!(warnings
            .iter()
            .all(|(_, w)| *w == FoldWarning::NotConverged { iterations: 1 }));
        assert!(result
            .folds
            .iter()
            .all(|f| f.fit.is_some_and(|fit| !fit.converged)));
        // The capped coefficients still score every row
        assert_eq!(result.oof_proba.len(), y.len());
        assert!(result.oof_proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_degenerate_training_fold() {
        // file0 is the only recording with positives
        let x = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        let y = [false, true, true, false, false, false];
        let groups = ["file0", "file0", "file0", "file1", "file1", "file1"];
        let result = train_eval(x.view(), &y, &groups, &config(2)).unwrap();

        let warnings = result.warnings();
        assert!(warnings
            .iter()
            .any(|(_, w)| *w == FoldWarning::SingleClassTraining { class: false }));
        assert!(warnings
            .iter()
            .any(|(_, w)| *w == FoldWarning::SingleClassValidation { class: false }));
        // file0 is scored by a model that only saw negatives
        assert_eq!(&result.oof_proba[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_inputs() {
        let (x, y, groups) = grouped_data();
        assert!(matches!(
            train_eval(x.view(), &y, &groups, &config(5)),
            Err(ClassifierError::TooFewGroups { groups: 4, n_splits: 5 })
        ));
        assert!(matches!(
            train_eval(x.view(), &y[..3], &groups, &config(2)),
            Err(ClassifierError::LengthMismatch { .. })
        ));
        assert!(matches!(
            train_eval(x.view(), &y, &groups[..3], &config(2)),
            Err(ClassifierError::GroupMismatch { .. })
        ));

        let mut bad_grid = config(2);
        bad_grid.threshold_grid = vec![0.5, 0.4];
        assert!(matches!(
            train_eval(x.view(), &y, &groups, &bad_grid),
            Err(ClassifierError::InvalidConfig(_))
        ));
        bad_grid.threshold_grid = vec![0.0, 0.5];
        assert!(bad_grid.validate().is_err());
    }
}
