//! EMG Signal Conditioning
//!
//! Band-limits and cleans one raw EMG channel and derives its rectified
//! linear envelope:
//! - 4th-order Butterworth band-pass (20-450 Hz by default)
//! - 2nd-order notch at the mains frequency
//! - full-wave rectification and a 5 Hz low-pass envelope
//!
//! Every stage is applied forward-backward, so outputs stay aligned with
//! the input sample for sample.

mod conditioner;
mod error;
mod filter;
mod signal;

pub use conditioner::{condition, ConditionedSignal, ConditioningConfig, Conditioner};
pub use error::ConditioningError;
pub use filter::{butter_bandpass, butter_lowpass, iir_notch, Biquad, SosFilter};
pub use signal::{estimate_sampling_rate, RawSignal};
