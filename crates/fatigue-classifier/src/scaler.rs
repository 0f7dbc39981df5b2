//! Per-Column Standardization

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::ClassifierError;

/// Z-score scaler fitted on training rows only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column means
    mean: Vec<f64>,
    /// Column population standard deviations, 1.0 where a column is constant
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics of `x` (rows x features)
    pub fn fit(x: ArrayView2<f64>) -> Result<Self, ClassifierError> {
        if x.nrows() == 0 {
            return Err(ClassifierError::EmptyInput);
        }
        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            mean.push(m);
            scale.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }
        Ok(Self { mean, scale })
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize `x` with the fitted statistics
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        if x.ncols() != self.n_features() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }
        let mut out = x.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }
}
