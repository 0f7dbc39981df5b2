//! Raw EMG Channel

use serde::{Deserialize, Serialize};

/// One raw EMG channel as delivered by a signal source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    /// Recording identifier (matches the label manifest `id`)
    pub file_id: String,
    /// Channel label inside the recording
    pub channel_label: String,
    /// Analog samples
    pub samples: Vec<f64>,
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
    /// 1-based repetition at which the subject failed, when known
    pub ground_truth_failure_rep: Option<usize>,
}

impl RawSignal {
    /// Create a new raw signal without ground truth
    pub fn new(
        file_id: impl Into<String>,
        channel_label: impl Into<String>,
        samples: Vec<f64>,
        sampling_rate: f64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            channel_label: channel_label.into(),
            samples,
            sampling_rate,
            ground_truth_failure_rep: None,
        }
    }

    /// Attach the ground-truth failure repetition
    pub fn with_failure_rep(mut self, rep: Option<usize>) -> Self {
        self.ground_truth_failure_rep = rep;
        self
    }

    /// Recording length in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sampling_rate > 0.0 {
            self.samples.len() as f64 / self.sampling_rate
        } else {
            0.0
        }
    }
}

/// Estimate the sampling rate from a time axis as `1 / median(diff(time))`
pub fn estimate_sampling_rate(time: &[f64]) -> Option<f64> {
    if time.len() < 2 {
        return None;
    }
    let mut steps: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
    steps.sort_by(|a, b| a.total_cmp(b));

    let mid = steps.len() / 2;
    let median = if steps.len() % 2 == 0 {
        0.5 * (steps[mid - 1] + steps[mid])
    } else {
        steps[mid]
    };

    (median > 0.0 && median.is_finite()).then(|| 1.0 / median)
}
