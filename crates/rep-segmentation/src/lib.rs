//! Repetition Segmentation
//!
//! Finds repetition peaks in a conditioned EMG envelope and derives one
//! time window per interior repetition.

mod peaks;
mod windows;

pub use peaks::{find_peaks, local_maxima, prominence, select_by_distance};
pub use windows::{
    segment, segment_envelope, RepWindow, Segmentation, SegmentationConfig, MIN_PEAKS,
};

use thiserror::Error;

/// Errors during segmentation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    #[error("Invalid segmentation config: {0}")]
    InvalidConfig(String),
    #[error("Invalid sampling rate: {0} Hz")]
    InvalidSamplingRate(f64),
}
