//! Signal Conditioning Chain
//!
//! raw -> band-pass -> notch -> rectify -> low-pass envelope

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConditioningError;
use crate::filter::{butter_bandpass, butter_lowpass, iir_notch, SosFilter};

/// Conditioning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    /// Band-pass lower cutoff (Hz)
    pub lowcut: f64,
    /// Band-pass upper cutoff (Hz)
    pub highcut: f64,
    /// Butterworth prototype order of the band-pass
    pub bandpass_order: usize,
    /// Mains interference frequency (Hz)
    pub notch_freq: f64,
    /// Notch quality factor
    pub notch_quality: f64,
    /// Envelope low-pass cutoff (Hz)
    pub envelope_cutoff: f64,
    /// Butterworth order of the envelope low-pass
    pub envelope_order: usize,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            lowcut: 20.0,
            highcut: 450.0,
            bandpass_order: 4,
            notch_freq: 50.0,
            notch_quality: 30.0,
            envelope_cutoff: 5.0,
            envelope_order: 4,
        }
    }
}

/// Every intermediate stage of one conditioned channel, all the same length
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionedSignal {
    pub sampling_rate: f64,
    pub raw: Vec<f64>,
    pub bandpassed: Vec<f64>,
    pub notched: Vec<f64>,
    pub rectified: Vec<f64>,
    pub envelope: Vec<f64>,
}

impl ConditionedSignal {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the signal holds no samples
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Time of each sample in seconds, starting at zero
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| i as f64 / self.sampling_rate)
            .collect()
    }
}

/// Filters designed for one sampling rate
#[derive(Debug, Clone)]
pub struct Conditioner {
    sampling_rate: f64,
    bandpass: SosFilter,
    notch: SosFilter,
    envelope: SosFilter,
}

impl Conditioner {
    /// Design the filter chain for `sampling_rate`
    pub fn new(config: &ConditioningConfig, sampling_rate: f64) -> Result<Self, ConditioningError> {
        let bandpass = butter_bandpass(
            config.bandpass_order,
            config.lowcut,
            config.highcut,
            sampling_rate,
        )?;
        let notch = iir_notch(config.notch_freq, config.notch_quality, sampling_rate)?;
        let envelope = butter_lowpass(config.envelope_order, config.envelope_cutoff, sampling_rate)?;

        debug!(
            "Designed conditioning filters at {} Hz: band-pass {}-{} Hz, notch {} Hz, envelope {} Hz",
            sampling_rate, config.lowcut, config.highcut, config.notch_freq, config.envelope_cutoff
        );

        Ok(Self {
            sampling_rate,
            bandpass,
            notch,
            envelope,
        })
    }

    /// Shortest input accepted by [`Conditioner::process`]
    pub fn min_signal_len(&self) -> usize {
        self.bandpass
            .padlen()
            .max(self.notch.padlen())
            .max(self.envelope.padlen())
            + 1
    }

    /// Band-pass then notch, without the envelope stage
    pub fn clean(&self, raw: &[f64]) -> Result<(Vec<f64>, Vec<f64>), ConditioningError> {
        validate_samples(raw)?;
        let required = self.min_signal_len();
        if raw.len() < required {
            return Err(ConditioningError::InsufficientSignalLength {
                len: raw.len(),
                required,
            });
        }
        let bandpassed = self.bandpass.filtfilt(raw)?;
        let notched = self.notch.filtfilt(&bandpassed)?;
        Ok((bandpassed, notched))
    }

    /// Run the full chain on one channel
    pub fn process(&self, raw: &[f64]) -> Result<ConditionedSignal, ConditioningError> {
        let (bandpassed, notched) = self.clean(raw)?;
        let rectified: Vec<f64> = notched.iter().map(|v| v.abs()).collect();
        // Low-pass undershoot after a burst can dip below zero
        let envelope: Vec<f64> = self
            .envelope
            .filtfilt(&rectified)?
            .into_iter()
            .map(|v| v.max(0.0))
            .collect();

        Ok(ConditionedSignal {
            sampling_rate: self.sampling_rate,
            raw: raw.to_vec(),
            bandpassed,
            notched,
            rectified,
            envelope,
        })
    }
}

fn validate_samples(raw: &[f64]) -> Result<(), ConditioningError> {
    if raw.is_empty() {
        return Err(ConditioningError::EmptySignal);
    }
    if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
        return Err(ConditioningError::NonFiniteSample(index));
    }
    Ok(())
}

/// Condition one raw channel with a freshly designed filter chain
pub fn condition(
    raw: &[f64],
    sampling_rate: f64,
    config: &ConditioningConfig,
) -> Result<ConditionedSignal, ConditioningError> {
    Conditioner::new(config, sampling_rate)?.process(raw)
}
