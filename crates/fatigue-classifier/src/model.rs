//! Standardize-then-Logistic Model

use feature_engine::MODEL_FEATURE_DIMENSION;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::logistic::{FitReport, LogisticConfig, LogisticRegression};
use crate::scaler::StandardScaler;
use crate::ClassifierError;

/// Stack fixed-width model inputs into a rows x features matrix
pub fn feature_matrix(rows: &[[f64; MODEL_FEATURE_DIMENSION]]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), MODEL_FEATURE_DIMENSION), |(i, j)| rows[i][j])
}

/// Fitted scaler and classifier, applied in that order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueModel {
    scaler: StandardScaler,
    classifier: LogisticRegression,
}

impl FatigueModel {
    /// Fit the scaler and the classifier on the same rows
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[bool],
        config: &LogisticConfig,
    ) -> Result<(Self, FitReport), ClassifierError> {
        let scaler = StandardScaler::fit(x)?;
        let z = scaler.transform(x)?;
        let (classifier, report) = LogisticRegression::fit(z.view(), y, config)?;
        Ok((Self { scaler, classifier }, report))
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Class-1 probability of each row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ClassifierError> {
        let z = self.scaler.transform(x)?;
        self.classifier.predict_proba(z.view())
    }
}
