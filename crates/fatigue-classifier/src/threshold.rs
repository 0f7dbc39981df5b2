//! Operating Threshold Selection

use serde::{Deserialize, Serialize};

use crate::metrics::{apply_threshold, ConfusionMatrix};

/// Points in the default grid
pub const DEFAULT_GRID_POINTS: usize = 181;
pub const DEFAULT_GRID_MIN: f64 = 0.05;
pub const DEFAULT_GRID_MAX: f64 = 0.95;

/// Evenly spaced thresholds over `[min, max]`, both ends included
pub fn linspace(min: f64, max: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { max } else { min + i as f64 * step })
                .collect()
        }
    }
}

/// 181 thresholds from 0.05 to 0.95 in steps of 0.005
pub fn default_threshold_grid() -> Vec<f64> {
    linspace(DEFAULT_GRID_MIN, DEFAULT_GRID_MAX, DEFAULT_GRID_POINTS)
}

/// One point of the threshold sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub balanced_accuracy: f64,
    pub predicted_positives: usize,
}

/// Balanced accuracy of thresholded probabilities at every grid point
pub fn sweep_thresholds(y_true: &[bool], proba: &[f64], grid: &[f64]) -> Vec<ThresholdPoint> {
    grid.iter()
        .map(|&threshold| {
            let m = ConfusionMatrix::from_predictions(y_true, &apply_threshold(proba, threshold));
            ThresholdPoint {
                threshold,
                balanced_accuracy: m.balanced_accuracy(),
                predicted_positives: m.predicted_positives(),
            }
        })
        .collect()
}

/// Sweep point with the highest balanced accuracy, the earliest on ties
pub fn select_threshold(sweep: &[ThresholdPoint]) -> Option<ThresholdPoint> {
    sweep.iter().copied().fold(None, |best, point| match best {
        Some(b) if point.balanced_accuracy <= b.balanced_accuracy => Some(b),
        _ => Some(point),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_grid() {
        let grid = default_threshold_grid();
        assert_eq!(grid.len(), 181);
        assert_eq!(grid[0], 0.05);
        assert_eq!(grid[180], 0.95);
        assert!((grid[90] - 0.5).abs() < 1e-12);
        assert!((grid[1] - grid[0] - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_first_maximum_wins() {
        let y = [false, false, true, true];
        let proba = [0.1, 0.2, 0.6, 0.7];
        let sweep = sweep_thresholds(&y, &proba, &[0.15, 0.3, 0.5, 0.65, 0.9]);
        let best = select_threshold(&sweep).unwrap();
        // 0.3 and 0.5 both separate perfectly
        assert_eq!(best.threshold, 0.3);
        assert_eq!(best.balanced_accuracy, 1.0);
        assert_eq!(best.predicted_positives, 2);
        assert!(select_threshold(&[]).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let sweep = sweep_thresholds(&[false, true], &[0.2, 0.5], &[0.5]);
        assert_eq!(sweep[0].predicted_positives, 1);
    }

    proptest! {
        #[test]
        fn prop_predicted_positives_non_increasing(
            proba in prop::collection::vec(0.0f64..1.0, 1..60),
            labels in prop::collection::vec(any::<bool>(), 60),
        ) {
            let y = &labels[..proba.len()];
            let sweep = sweep_thresholds(y, &proba, &default_threshold_grid());
            for pair in sweep.windows(2) {
                prop_assert!(pair[1].predicted_positives <= pair[0].predicted_positives);
            }
        }
    }
}
