//! Synthetic recordings for tests: Hann-gated multi-tone bursts whose
//! amplitude grows and whose spectrum drops once fatigue sets in.

use std::f64::consts::PI;

pub struct SyntheticRecording {
    pub bursts: usize,
    /// 1-based burst from which the burst is "fatigued"
    pub failure_burst: usize,
    pub seed: u64,
}

impl SyntheticRecording {
    pub const SAMPLING_RATE: f64 = 1000.0;
    /// Burst spacing (seconds)
    pub const PERIOD: f64 = 2.5;
    /// Silence before the first burst centre and after the last (seconds)
    pub const MARGIN: f64 = 1.5;

    pub fn new(bursts: usize, failure_burst: usize) -> Self {
        Self {
            bursts,
            failure_burst,
            seed: 0x9e37_79b9_7f4a_7c15,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed.max(1);
        self
    }

    pub fn samples(&self) -> Vec<f64> {
        let fs = Self::SAMPLING_RATE;
        let duration = 2.0 * Self::MARGIN + Self::PERIOD * (self.bursts.saturating_sub(1)) as f64;
        let n = (duration * fs) as usize;
        let mut state = self.seed;
        let mut noise = move || {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        };

        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let mut value = 0.02 * noise() + 0.05 * (2.0 * PI * 50.0 * t).sin();
                for b in 0..self.bursts {
                    let centre = Self::MARGIN + Self::PERIOD * b as f64;
                    let offset = t - centre;
                    if offset.abs() >= 0.5 {
                        continue;
                    }
                    let gate = (PI * (offset + 0.5)).sin().powi(2);
                    let fatigued = b + 1 >= self.failure_burst;
                    let amplitude = 1.0 + 0.1 * b as f64 + if fatigued { 0.5 } else { 0.0 };
                    let shift = if fatigued { 0.7 } else { 1.0 };
                    let carrier = (2.0 * PI * 80.0 * shift * t).sin()
                        + 0.7 * (2.0 * PI * 130.0 * shift * t).sin()
                        + 0.5 * (2.0 * PI * 210.0 * shift * t).sin();
                    value += amplitude * gate * carrier;
                }
                value
            })
            .collect()
    }
}
