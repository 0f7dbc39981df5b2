//! Amplitude Statistics and Sequence Helpers

/// Mean value; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Root-mean-square amplitude; NaN for an empty slice
pub fn rms(values: &[f64]) -> f64 {
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// First difference against the previous element, zero for the first
pub fn diff1(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        out.push(if i == 0 { 0.0 } else { v - values[i - 1] });
    }
    out
}

/// Trailing mean over up to `window` elements (at least one)
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            mean(&values[from..=i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_computation() {
        assert!((rms(&[3.0, -3.0, 3.0, -3.0]) - 3.0).abs() < 1e-12);
        assert!((rms(&[1.0, 7.0]) - 5.0).abs() < 1e-12);
        assert!(rms(&[]).is_nan());
    }

    #[test]
    fn test_mean_computation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mean(&values) - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_diff1() {
        assert_eq!(diff1(&[2.0, 5.0, 4.0]), vec![0.0, 3.0, -1.0]);
        assert!(diff1(&[]).is_empty());
    }

    #[test]
    fn test_trailing_mean_min_window_one() {
        let out = trailing_mean(&[3.0, 6.0, 9.0, 0.0], 3);
        assert_eq!(out, vec![3.0, 4.5, 6.0, 5.0]);
    }
}
