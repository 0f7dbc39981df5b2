//! IIR Filter Design and Zero-Phase Filtering
//!
//! Butterworth band-pass/low-pass and narrow notch filters, kept as cascaded
//! second-order sections and applied forward-backward so the output has no
//! phase shift and the same length as the input.

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::ConditioningError;

/// Imaginary parts below this are treated as real poles
const REAL_POLE_EPS: f64 = 1e-12;

/// One second-order section: numerator `b`, denominator `a` with `a[0] == 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Gain at DC (z = 1)
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// Transposed direct-form II state after a unit step has settled
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z1 = self.b[2] - self.a[2] * g;
        let z0 = self.b[1] - self.a[1] * g + z1;
        [z0, z1]
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// Build a filter from explicit sections
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    /// Number of samples mirrored at each edge by [`SosFilter::filtfilt`].
    ///
    /// The input must be strictly longer than this.
    pub fn padlen(&self) -> usize {
        let b_trailing = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let a_trailing = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        3 * (2 * self.sections.len() + 1 - b_trailing.min(a_trailing))
    }

    /// Per-section initial state for a signal that starts at `x0`
    fn initial_state(&self, x0: f64) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let state = [z0 * scale * x0, z1 * scale * x0];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Causal filtering with explicit state
    fn run(&self, input: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
        let mut y = input.to_vec();
        for (section, z) in self.sections.iter().zip(state.iter_mut()) {
            let [b0, b1, b2] = section.b;
            let [_, a1, a2] = section.a;
            for v in y.iter_mut() {
                let x = *v;
                let out = b0 * x + z[0];
                z[0] = b1 * x - a1 * out + z[1];
                z[1] = b2 * x - a2 * out;
                *v = out;
            }
        }
        y
    }

    /// Zero-phase filtering: odd-extend both edges, filter forward, then
    /// filter the reversed result and strip the padding.
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>, ConditioningError> {
        let padlen = self.padlen();
        if input.len() <= padlen {
            return Err(ConditioningError::InsufficientSignalLength {
                len: input.len(),
                required: padlen + 1,
            });
        }

        let extended = odd_extension(input, padlen);

        let mut state = self.initial_state(extended[0]);
        let mut forward = self.run(&extended, &mut state);
        forward.reverse();

        let mut state = self.initial_state(forward[0]);
        let mut backward = self.run(&forward, &mut state);
        backward.reverse();

        Ok(backward[padlen..padlen + input.len()].to_vec())
    }
}

/// Point-symmetric extension of `x` by `padlen` samples at each end
fn odd_extension(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut out = Vec::with_capacity(n + 2 * padlen);
    out.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    out
}

fn nyquist(sample_rate: f64) -> Result<f64, ConditioningError> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ConditioningError::InvalidSamplingRate(sample_rate));
    }
    Ok(0.5 * sample_rate)
}

fn check_order(order: usize, nyquist: f64) -> Result<(), ConditioningError> {
    if order == 0 {
        return Err(ConditioningError::InvalidFilterSpec {
            reason: "filter order must be at least 1".to_string(),
            nyquist,
        });
    }
    Ok(())
}

fn check_frequency(name: &str, freq: f64, nyquist: f64) -> Result<(), ConditioningError> {
    if !freq.is_finite() || freq <= 0.0 || freq >= nyquist {
        return Err(ConditioningError::InvalidFilterSpec {
            reason: format!("{} {} Hz outside (0, nyquist)", name, freq),
            nyquist,
        });
    }
    Ok(())
}

/// Analog Butterworth prototype poles (unit cutoff)
fn butterworth_prototype(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|k| {
            let m = -n + 1.0 + 2.0 * k as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Pre-warped analog frequency for a cutoff normalized to nyquist
fn prewarp(normalized: f64) -> f64 {
    4.0 * (PI * normalized / 2.0).tan()
}

/// Bilinear map of an s-plane root into the z-plane
fn bilinear(root: Complex64) -> Complex64 {
    let fs2 = Complex64::new(4.0, 0.0);
    (fs2 + root) / (fs2 - root)
}

/// Group digital zeros and poles into second-order sections.
///
/// Zeros are all real here; poles are paired with their conjugates and any
/// real poles are paired with each other.
fn zpk_to_sos(zeros: &[f64], poles: &[Complex64], gain: f64) -> SosFilter {
    let mut denominators: Vec<[f64; 3]> = poles
        .iter()
        .filter(|p| p.im > REAL_POLE_EPS)
        .map(|p| [1.0, -2.0 * p.re, p.norm_sqr()])
        .collect();

    let real_poles: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= REAL_POLE_EPS)
        .map(|p| p.re)
        .collect();
    for pair in real_poles.chunks(2) {
        match pair {
            [p1, p2] => denominators.push([1.0, -(p1 + p2), p1 * p2]),
            [p] => denominators.push([1.0, -p, 0.0]),
            _ => {}
        }
    }

    let mut numerators: Vec<[f64; 3]> = zeros
        .chunks(2)
        .map(|pair| match pair {
            [z1, z2] => [1.0, -(z1 + z2), z1 * z2],
            [z] => [1.0, -z, 0.0],
            _ => [1.0, 0.0, 0.0],
        })
        .collect();

    let count = denominators.len().max(numerators.len());
    denominators.resize(count, [1.0, 0.0, 0.0]);
    numerators.resize(count, [1.0, 0.0, 0.0]);

    let mut sections: Vec<Biquad> = numerators
        .into_iter()
        .zip(denominators)
        .map(|(b, a)| Biquad { b, a })
        .collect();

    if let Some(first) = sections.first_mut() {
        for coeff in first.b.iter_mut() {
            *coeff *= gain;
        }
    }

    SosFilter::new(sections)
}

/// Butterworth band-pass of the given prototype order (the cascade has `2 * order` poles)
pub fn butter_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
) -> Result<SosFilter, ConditioningError> {
    let nyq = nyquist(sample_rate)?;
    check_order(order, nyq)?;
    check_frequency("lowcut", low_hz, nyq)?;
    check_frequency("highcut", high_hz, nyq)?;
    if low_hz >= high_hz {
        return Err(ConditioningError::InvalidFilterSpec {
            reason: format!("lowcut {} Hz must be below highcut {} Hz", low_hz, high_hz),
            nyquist: nyq,
        });
    }

    let wl = prewarp(low_hz / nyq);
    let wh = prewarp(high_hz / nyq);
    let bw = wh - wl;
    let wo2 = Complex64::new(wl * wh, 0.0);

    let mut analog_poles = Vec::with_capacity(2 * order);
    for p in butterworth_prototype(order) {
        let p_lp = p * (bw / 2.0);
        let offset = (p_lp * p_lp - wo2).sqrt();
        analog_poles.push(p_lp + offset);
        analog_poles.push(p_lp - offset);
    }

    // `order` analog zeros sit at the origin; the other `order` go to infinity
    let fs2 = Complex64::new(4.0, 0.0);
    let zero_term = fs2.powu(order as u32);
    let pole_term = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs2 - p));
    let gain = bw.powi(order as i32) * (zero_term / pole_term).re;

    let poles: Vec<Complex64> = analog_poles.into_iter().map(bilinear).collect();
    let zeros: Vec<f64> = (0..order).flat_map(|_| [1.0, -1.0]).collect();

    Ok(zpk_to_sos(&zeros, &poles, gain))
}

/// Butterworth low-pass of the given order
pub fn butter_lowpass(
    order: usize,
    cutoff_hz: f64,
    sample_rate: f64,
) -> Result<SosFilter, ConditioningError> {
    let nyq = nyquist(sample_rate)?;
    check_order(order, nyq)?;
    check_frequency("cutoff", cutoff_hz, nyq)?;

    let wo = prewarp(cutoff_hz / nyq);
    let analog_poles: Vec<Complex64> = butterworth_prototype(order)
        .into_iter()
        .map(|p| p * wo)
        .collect();

    let fs2 = Complex64::new(4.0, 0.0);
    let pole_term = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs2 - p));
    let gain = wo.powi(order as i32) * (Complex64::new(1.0, 0.0) / pole_term).re;

    let poles: Vec<Complex64> = analog_poles.into_iter().map(bilinear).collect();
    let zeros = vec![-1.0; order];

    Ok(zpk_to_sos(&zeros, &poles, gain))
}

/// Second-order notch centred on `freq_hz` with quality factor `quality`
pub fn iir_notch(freq_hz: f64, quality: f64, sample_rate: f64) -> Result<SosFilter, ConditioningError> {
    let nyq = nyquist(sample_rate)?;
    check_frequency("notch frequency", freq_hz, nyq)?;
    if !quality.is_finite() || quality <= 0.0 {
        return Err(ConditioningError::InvalidFilterSpec {
            reason: format!("notch quality {} must be positive", quality),
            nyquist: nyq,
        });
    }

    let w0 = PI * freq_hz / nyq;
    let bw = w0 / quality;
    // -3 dB bandwidth edges
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = w0.cos();

    Ok(SosFilter::new(vec![Biquad {
        b: [gain, -2.0 * gain * cos_w0, gain],
        a: [1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    }]))
}
