//! Conditioning Error Types

use thiserror::Error;

/// Errors while designing or applying the conditioning filters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditioningError {
    /// Cutoff or centre frequencies do not fit inside `(0, nyquist)`
    #[error("Invalid filter spec: {reason} (nyquist {nyquist} Hz)")]
    InvalidFilterSpec { reason: String, nyquist: f64 },

    /// Sampling rate must be finite and strictly positive
    #[error("Invalid sampling rate: {0} Hz")]
    InvalidSamplingRate(f64),

    /// Forward-backward filtering needs more samples than the padding length
    #[error("Signal too short for zero-phase filtering: {len} samples, need at least {required}")]
    InsufficientSignalLength { len: usize, required: usize },

    /// No samples at all
    #[error("Signal contains no samples")]
    EmptySignal,

    /// NaN or infinite sample in the raw input
    #[error("Non-finite sample at index {0}")]
    NonFiniteSample(usize),
}
