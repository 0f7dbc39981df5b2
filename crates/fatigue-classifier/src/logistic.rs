//! Class-Balanced L2 Logistic Regression
//!
//! Minimizes `0.5 * |w|^2 + C * sum_i s_i * logloss_i` with a damped
//! Newton method. The intercept is not penalized and the sample weights
//! `s_i = n / (2 * n_class(i))` balance the two classes.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ClassifierError;

/// Armijo sufficient-decrease constant
const ARMIJO: f64 = 1e-4;

/// Step halvings tried before a Newton step is abandoned
const MAX_HALVINGS: usize = 40;

/// Solver parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    /// Inverse regularization strength
    pub c: f64,
    /// Newton iteration cap
    pub max_iter: usize,
    /// Stop when the largest gradient component, divided by the number of
    /// rows, drops below this
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
        }
    }
}

impl LogisticConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(self.c > 0.0) || !self.c.is_finite() {
            return Err(ClassifierError::InvalidConfig(format!(
                "regularization C must be positive, got {}",
                self.c
            )));
        }
        if self.max_iter == 0 {
            return Err(ClassifierError::InvalidConfig("max_iter must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Solver outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
}

/// Fitted binary logistic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coef: Vec<f64>,
    intercept: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^t)` without overflow
fn softplus(t: f64) -> f64 {
    t.max(0.0) + (-t.abs()).exp().ln_1p()
}

/// Per-row weights `n / (2 * n_class)`
pub fn balanced_weights(y: &[bool]) -> Result<Vec<f64>, ClassifierError> {
    let positives = y.iter().filter(|&&v| v).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(ClassifierError::SingleClass);
    }
    let n = y.len() as f64;
    let w_pos = n / (2.0 * positives as f64);
    let w_neg = n / (2.0 * negatives as f64);
    Ok(y.iter().map(|&v| if v { w_pos } else { w_neg }).collect())
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if !(a[[pivot, col]].abs() > f64::MIN_POSITIVE) {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let v = a[[col, k]];
                a[[row, k]] -= factor * v;
            }
            let v = b[col];
            b[row] -= factor * v;
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

impl LogisticRegression {
    /// Fit on `x` (rows x features) and binary labels `y`
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[bool],
        config: &LogisticConfig,
    ) -> Result<(Self, FitReport), ClassifierError> {
        config.validate()?;
        let (n, d) = x.dim();
        if n == 0 {
            return Err(ClassifierError::EmptyInput);
        }
        if y.len() != n {
            return Err(ClassifierError::LengthMismatch {
                rows: n,
                labels: y.len(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFiniteInput);
        }

        let c = config.c;
        let weights = Array1::from(balanced_weights(y)?);
        let target: Array1<f64> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();

        // Trailing column of ones carries the intercept
        let mut xa = Array2::ones((n, d + 1));
        xa.slice_mut(s![.., ..d]).assign(&x);

        let objective = |theta: &Array1<f64>| -> f64 {
            let z = xa.dot(theta);
            let loss: f64 = z
                .iter()
                .zip(&target)
                .zip(&weights)
                .map(|((&z, &t), &w)| w * if t > 0.5 { softplus(-z) } else { softplus(z) })
                .sum();
            let w = theta.slice(s![..d]);
            0.5 * w.dot(&w) + c * loss
        };

        let mut theta: Array1<f64> = Array1::zeros(d + 1);
        let mut report = FitReport {
            iterations: 0,
            converged: false,
        };

        for iter in 0..config.max_iter {
            let p = xa.dot(&theta).mapv(sigmoid);
            let residual = (&p - &target) * &weights * c;
            let mut grad = xa.t().dot(&residual);
            for j in 0..d {
                grad[j] += theta[j];
            }

            let grad_max = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if grad_max / n as f64 <= config.tol {
                report.converged = true;
                break;
            }

            let curvature = p.mapv(|p| p * (1.0 - p)) * &weights * c;
            let weighted = &xa * &curvature.view().insert_axis(Axis(1));
            let mut hessian = xa.t().dot(&weighted);
            for j in 0..d {
                hessian[[j, j]] += 1.0;
            }
            hessian[[d, d]] += 1e-12;

            let step = solve(hessian, grad.clone()).ok_or(ClassifierError::SingularSystem)?;
            let current = objective(&theta);
            let slope = grad.dot(&step);

            let mut t = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let candidate = &theta - &(&step * t);
                if objective(&candidate) <= current - ARMIJO * t * slope {
                    accepted = Some(candidate);
                    break;
                }
                t *= 0.5;
            }

            report.iterations = iter + 1;
            match accepted {
                Some(next) => theta = next,
                None => {
                    debug!("Line search stalled at iteration {}", iter + 1);
                    break;
                }
            }
        }

        let coef = theta.slice(s![..d]).to_vec();
        let intercept = theta[d];
        debug!(
            "Logistic fit: {} rows, {} features, {} iterations, converged={}",
            n, d, report.iterations, report.converged
        );
        Ok((Self { coef, intercept }, report))
    }

    /// Coefficients in feature order
    pub fn coef(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Class-1 probability of each row of `x`
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ClassifierError> {
        if x.ncols() != self.coef.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.coef.len(),
                actual: x.ncols(),
            });
        }
        let z = x.dot(&ArrayView1::from(&self.coef[..])) + self.intercept;
        Ok(z.iter().map(|&z| sigmoid(z)).collect())
    }
}
