//! Per-Repetition Feature Extraction

use rep_segmentation::RepWindow;
use serde::{Deserialize, Serialize};
use signal_conditioner::ConditionedSignal;
use tracing::debug;

use crate::fft::FftAnalyzer;
use crate::statistics::rms;
use crate::FeatureError;

/// Raw features of one repetition window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepFeatures {
    /// 1-based repetition number (ordinal of the centre peak)
    pub rep: usize,
    pub start: usize,
    pub end: usize,
    pub peak_index: usize,
    /// Time of the peak (seconds)
    pub peak_time: f64,
    /// RMS of the notched signal over the window
    pub rms: f64,
    /// Welch median frequency of the notched signal (Hz)
    pub median_frequency: f64,
    /// Envelope value at the peak
    pub envelope_peak: f64,
    /// Window length in samples
    pub rep_duration: f64,
}

impl RepFeatures {
    /// Whether every numeric value is finite
    pub fn is_finite(&self) -> bool {
        [
            self.peak_time,
            self.rms,
            self.median_frequency,
            self.envelope_peak,
            self.rep_duration,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Feature extractor for the windows of one conditioned signal
pub struct FeatureExtractor {
    /// FFT analyzer
    fft_analyzer: FftAnalyzer,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(sample_rate: f64) -> Self {
        Self {
            fft_analyzer: FftAnalyzer::new(sample_rate),
        }
    }

    /// Extract one feature record per window, in window order
    pub fn extract(
        &mut self,
        conditioned: &ConditionedSignal,
        windows: &[RepWindow],
        time_axis: &[f64],
    ) -> Result<Vec<RepFeatures>, FeatureError> {
        let len = conditioned.len();
        if time_axis.len() < len {
            return Err(FeatureError::TimeAxisMismatch {
                signal: len,
                time_axis: time_axis.len(),
            });
        }

        debug!("Extracting features for {} windows", windows.len());

        let mut out = Vec::with_capacity(windows.len());
        for w in windows {
            if w.start >= w.end || w.end > len || w.peak_index >= len {
                return Err(FeatureError::WindowOutOfBounds {
                    start: w.start,
                    end: w.end,
                    peak_index: w.peak_index,
                    len,
                });
            }

            let segment = &conditioned.notched[w.start..w.end];
            out.push(RepFeatures {
                rep: w.peak_number,
                start: w.start,
                end: w.end,
                peak_index: w.peak_index,
                peak_time: time_axis[w.peak_index],
                rms: rms(segment),
                median_frequency: self.fft_analyzer.median_frequency(segment),
                envelope_peak: conditioned.envelope[w.peak_index],
                rep_duration: (w.end - w.start) as f64,
            });
        }
        Ok(out)
    }
}

/// Extract features with a one-off extractor
pub fn extract(
    conditioned: &ConditionedSignal,
    windows: &[RepWindow],
    time_axis: &[f64],
) -> Result<Vec<RepFeatures>, FeatureError> {
    FeatureExtractor::new(conditioned.sampling_rate).extract(conditioned, windows, time_axis)
}
