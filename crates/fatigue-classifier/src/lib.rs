//! Fatigue Classifier
//!
//! Standardized, class-balanced logistic regression over per-repetition
//! features, evaluated with recording-grouped K-fold cross-validation.
//! The operating threshold is the grid point with the best out-of-fold
//! balanced accuracy.

mod bundle;
mod cv;
mod engine;
mod logistic;
mod metrics;
mod model;
mod scaler;
mod threshold;

pub use bundle::{BundleParams, ModelBundle};
pub use cv::{group_k_fold, Fold};
pub use engine::{
    train_eval, train_eval_dataset, train_final_model, EvaluationResult, FoldDiagnostics,
    FoldWarning, TrainConfig,
};
pub use logistic::{balanced_weights, FitReport, LogisticConfig, LogisticRegression};
pub use metrics::{
    apply_threshold, average_precision, roc_auc, ClassMetrics, ClassificationReport,
    ConfusionMatrix,
};
pub use model::{feature_matrix, FatigueModel};
pub use scaler::StandardScaler;
pub use threshold::{
    default_threshold_grid, linspace, select_threshold, sweep_thresholds, ThresholdPoint,
};

use thiserror::Error;

/// Errors during training, evaluation and scoring
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("No rows to fit")]
    EmptyInput,

    #[error("{rows} rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("{rows} rows but {groups} group ids")]
    GroupMismatch { rows: usize, groups: usize },

    #[error("Invalid input shape: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Feature matrix contains non-finite values")]
    NonFiniteInput,

    #[error("Labels contain a single class")]
    SingleClass,

    #[error("{groups} distinct groups cannot fill {n_splits} folds")]
    TooFewGroups { groups: usize, n_splits: usize },

    #[error("Newton system is singular")]
    SingularSystem,

    #[error("Incompatible model bundle: {0}")]
    IncompatibleBundle(String),
}
