//! Welch Power Spectral Density and Median Frequency

use rustfft::{num_complex::Complex, FftPlanner};

/// Longest Welch segment
pub const MAX_SEGMENT_LEN: usize = 1024;

/// One-sided power spectral density
#[derive(Debug, Clone, Default)]
pub struct PowerSpectrum {
    /// Bin frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// Density per bin (units^2 / Hz)
    pub density: Vec<f64>,
    /// Number of averaged segments
    pub segments: usize,
}

impl PowerSpectrum {
    /// Sum of the density over all bins
    pub fn total_power(&self) -> f64 {
        self.density.iter().sum()
    }

    /// Frequency at which the cumulative density first reaches half the total.
    ///
    /// Zero when the spectrum carries no power.
    pub fn median_frequency(&self) -> f64 {
        let total = self.total_power();
        if total == 0.0 || !total.is_finite() {
            return 0.0;
        }
        let half = total / 2.0;
        let mut cumulative = 0.0;
        for (freq, p) in self.frequencies.iter().zip(&self.density) {
            cumulative += p;
            if cumulative >= half {
                return *freq;
            }
        }
        self.frequencies.last().copied().unwrap_or(0.0)
    }
}

/// FFT analyzer for Welch spectra
pub struct FftAnalyzer {
    /// FFT planner for efficient computation
    planner: FftPlanner<f64>,
    /// Sampling frequency (Hz)
    sample_rate: f64,
    /// Upper bound on the Welch segment length
    max_segment_len: usize,
}

impl FftAnalyzer {
    /// Create a new FFT analyzer
    pub fn new(sample_rate: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            sample_rate,
            max_segment_len: MAX_SEGMENT_LEN,
        }
    }

    /// Periodic Hann window
    fn hann_window(n: usize) -> Vec<f64> {
        if n == 1 {
            return vec![1.0];
        }
        (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
            .collect()
    }

    /// Welch PSD: Hann-windowed, mean-detrended segments of
    /// `min(1024, len)` samples with 50% overlap, averaged
    pub fn welch(&mut self, signal: &[f64]) -> PowerSpectrum {
        if signal.is_empty() {
            return PowerSpectrum::default();
        }

        let nperseg = signal.len().min(self.max_segment_len);
        let step = nperseg - nperseg / 2;
        let segments = (signal.len() - nperseg) / step + 1;

        let window = Self::hann_window(nperseg);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let fft = self.planner.plan_fft_forward(nperseg);

        let bins = nperseg / 2 + 1;
        let mut density = vec![0.0; bins];
        let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(nperseg);

        for seg in 0..segments {
            let chunk = &signal[seg * step..seg * step + nperseg];
            let mean = chunk.iter().sum::<f64>() / nperseg as f64;

            buffer.clear();
            buffer.extend(
                chunk
                    .iter()
                    .zip(&window)
                    .map(|(&v, &w)| Complex::new((v - mean) * w, 0.0)),
            );
            fft.process(&mut buffer);

            for (acc, c) in density.iter_mut().zip(&buffer) {
                *acc += c.norm_sqr();
            }
        }

        let scale = 1.0 / (self.sample_rate * window_power * segments as f64);
        for p in density.iter_mut() {
            *p *= scale;
        }

        // Fold negative frequencies; DC and (for even lengths) Nyquist appear once
        let doubled_end = if nperseg % 2 == 0 { bins - 1 } else { bins };
        for p in density.iter_mut().take(doubled_end).skip(1) {
            *p *= 2.0;
        }

        let freq_resolution = self.sample_rate / nperseg as f64;
        let frequencies = (0..bins).map(|i| i as f64 * freq_resolution).collect();

        PowerSpectrum {
            frequencies,
            density,
            segments,
        }
    }

    /// Median frequency of a segment's Welch spectrum
    pub fn median_frequency(&mut self, signal: &[f64]) -> f64 {
        self.welch(signal).median_frequency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_median_frequency_single_tone() {
        let mut analyzer = FftAnalyzer::new(1000.0);
        let mdf = analyzer.median_frequency(&tone(100.0, 1000.0, 2000));
        assert!((mdf - 100.0).abs() <= 1.0, "mdf {}", mdf);
    }

    #[test]
    fn test_median_frequency_between_tones() {
        let mut analyzer = FftAnalyzer::new(1000.0);
        let a = tone(60.0, 1000.0, 3000);
        let b = tone(240.0, 1000.0, 3000);
        let mixed: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let mdf = analyzer.median_frequency(&mixed);
        assert!(mdf >= 59.0 && mdf <= 241.0);
    }

    #[test]
    fn test_segment_count_and_bins() {
        let mut analyzer = FftAnalyzer::new(1000.0);
        let spectrum = analyzer.welch(&tone(50.0, 1000.0, 2500));
        assert_eq!(spectrum.segments, 3);
        assert_eq!(spectrum.frequencies.len(), 513);
        assert_eq!(spectrum.density.len(), 513);

        let short = analyzer.welch(&tone(50.0, 1000.0, 301));
        assert_eq!(short.segments, 1);
        assert_eq!(short.frequencies.len(), 151);
    }

    #[test]
    fn test_zero_power() {
        let mut analyzer = FftAnalyzer::new(1000.0);
        assert_eq!(analyzer.median_frequency(&[0.0; 256]), 0.0);
        assert_eq!(analyzer.median_frequency(&[3.0; 256]), 0.0);
        assert_eq!(analyzer.median_frequency(&[]), 0.0);
        assert_eq!(analyzer.median_frequency(&[1.5]), 0.0);
    }

    #[test]
    fn test_density_integrates_to_variance() {
        let fs = 1000.0;
        let mut analyzer = FftAnalyzer::new(fs);
        let x = tone(125.0, fs, 4096);
        let spectrum = analyzer.welch(&x);
        let df = fs / 1024.0;
        let power = spectrum.total_power() * df;
        // Unit sine has variance 0.5
        assert!((power - 0.5).abs() < 0.02, "power {}", power);
    }
}
