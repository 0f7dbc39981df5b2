//! Repetition Windows from Envelope Peaks

use serde::{Deserialize, Serialize};
use signal_conditioner::ConditionedSignal;
use tracing::{debug, info};

use crate::peaks::find_peaks;
use crate::SegmentationError;

/// Fewest peaks that still bracket one interior repetition
pub const MIN_PEAKS: usize = 3;

/// Segmentation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Minimum spacing between accepted peaks (seconds)
    pub distance_seconds: f64,
    /// Minimum prominence as a fraction of the envelope maximum
    pub prominence_fraction: f64,
    /// Shortest accepted window (seconds)
    pub min_len_seconds: f64,
    /// Longest accepted window (seconds)
    pub max_len_seconds: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            distance_seconds: 2.0,
            prominence_fraction: 0.2,
            min_len_seconds: 0.3,
            max_len_seconds: 10.0,
        }
    }
}

impl SegmentationConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), SegmentationError> {
        if !(self.distance_seconds > 0.0) || !self.distance_seconds.is_finite() {
            return Err(SegmentationError::InvalidConfig(format!(
                "distance_seconds must be positive, got {}",
                self.distance_seconds
            )));
        }
        if !(self.prominence_fraction >= 0.0) || !self.prominence_fraction.is_finite() {
            return Err(SegmentationError::InvalidConfig(format!(
                "prominence_fraction must be non-negative, got {}",
                self.prominence_fraction
            )));
        }
        if !(self.min_len_seconds >= 0.0) || !(self.max_len_seconds >= self.min_len_seconds) {
            return Err(SegmentationError::InvalidConfig(format!(
                "window length bounds [{}, {}] are not ordered",
                self.min_len_seconds, self.max_len_seconds
            )));
        }
        Ok(())
    }
}

/// Sample range of one repetition: `start <= i < end`, centred on `peak_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepWindow {
    pub start: usize,
    pub end: usize,
    pub peak_index: usize,
    /// 1-based position of the centre peak among all detected peaks
    pub peak_number: usize,
}

impl RepWindow {
    /// Window length in samples
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the window covers no samples
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Result of segmenting one envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segmentation {
    /// Accepted peaks in time order
    pub peaks: Vec<usize>,
    /// Windows around interior peaks that passed the length check
    pub windows: Vec<RepWindow>,
    /// Interior windows dropped by the length check
    pub discarded: usize,
}

impl Segmentation {
    /// Fewer than [`MIN_PEAKS`] peaks were found, so no window could be delimited
    pub fn insufficient_peaks(&self) -> bool {
        self.peaks.len() < MIN_PEAKS
    }
}

/// Segment an envelope sampled at `sampling_rate`.
///
/// The first and last peaks only anchor the boundaries of their
/// neighbours; every interior peak gets a window spanning the midpoints to
/// its neighbours.
pub fn segment_envelope(
    envelope: &[f64],
    sampling_rate: f64,
    config: &SegmentationConfig,
) -> Result<Segmentation, SegmentationError> {
    config.validate()?;
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return Err(SegmentationError::InvalidSamplingRate(sampling_rate));
    }

    let max_env = envelope.iter().cloned().fold(0.0_f64, f64::max);
    let distance = ((config.distance_seconds * sampling_rate) as usize).max(1);
    let min_prominence = config.prominence_fraction * max_env;

    let peaks = find_peaks(envelope, distance, min_prominence);
    debug!(
        "Found {} peaks (distance={} samples, prominence>={:.4})",
        peaks.len(),
        distance,
        min_prominence
    );

    if peaks.len() < MIN_PEAKS {
        info!("Only {} peaks detected, no repetitions delimited", peaks.len());
        return Ok(Segmentation {
            peaks,
            windows: Vec::new(),
            discarded: 0,
        });
    }

    let min_len = (config.min_len_seconds * sampling_rate) as usize;
    let max_len = (config.max_len_seconds * sampling_rate) as usize;

    let mut windows = Vec::with_capacity(peaks.len() - 2);
    let mut discarded = 0;
    for i in 1..peaks.len() - 1 {
        let (prev, peak, next) = (peaks[i - 1], peaks[i], peaks[i + 1]);
        let start = (prev + peak) / 2;
        let end = ((peak + next) / 2).min(envelope.len());

        let len = end - start;
        if len < min_len || len > max_len || !(start < peak && peak < end) {
            debug!(
                "Discarding window around peak {} ({} samples, bounds [{}, {}])",
                peak, len, min_len, max_len
            );
            discarded += 1;
            continue;
        }

        windows.push(RepWindow {
            start,
            end,
            peak_index: peak,
            peak_number: i + 1,
        });
    }

    Ok(Segmentation {
        peaks,
        windows,
        discarded,
    })
}

/// Segment the envelope of a conditioned signal
pub fn segment(
    conditioned: &ConditionedSignal,
    config: &SegmentationConfig,
) -> Result<Segmentation, SegmentationError> {
    segment_envelope(&conditioned.envelope, conditioned.sampling_rate, config)
}
