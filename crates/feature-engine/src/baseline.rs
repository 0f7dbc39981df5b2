//! Baseline-Relative and Dynamic Features
//!
//! Each recording is normalized against its own first repetitions, and
//! short-horizon dynamics are added. Every value for repetition `k` depends
//! only on repetitions `<= k` (plus the baseline window).

use serde::{Deserialize, Serialize};

use crate::features::RepFeatures;
use crate::statistics::{diff1, mean, trailing_mean};

/// Repetitions averaged into the baseline
pub const BASELINE_REPS: usize = 3;

/// Guards the relative features against a zero baseline
pub const BASELINE_EPS: f64 = 1e-9;

/// Trailing window of the rolling means
pub const ROLLING_WINDOW: usize = 3;

/// Mean of the first repetitions of a recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub rms: f64,
    pub median_frequency: f64,
    pub envelope_peak: f64,
    pub rep_duration: f64,
    /// Number of repetitions actually averaged
    pub reps_used: usize,
}

impl Baseline {
    /// Baseline over the first `min(3, len)` entries of `reps`, which must be
    /// sorted by repetition number
    pub fn from_sorted(reps: &[RepFeatures]) -> Option<Self> {
        if reps.is_empty() {
            return None;
        }
        let head = &reps[..reps.len().min(BASELINE_REPS)];
        let column = |f: fn(&RepFeatures) -> f64| mean(&head.iter().map(f).collect::<Vec<_>>());

        Some(Self {
            rms: column(|r| r.rms),
            median_frequency: column(|r| r.median_frequency),
            envelope_peak: column(|r| r.envelope_peak),
            rep_duration: column(|r| r.rep_duration),
            reps_used: head.len(),
        })
    }
}

/// Derived columns added to each repetition
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicFeatures {
    pub rms_rel_base: f64,
    pub rms_delta_base: f64,
    pub median_frequency_rel_base: f64,
    pub median_frequency_delta_base: f64,
    pub envelope_peak_rel_base: f64,
    pub envelope_peak_delta_base: f64,
    pub rep_duration_rel_base: f64,
    pub rep_duration_delta_base: f64,
    pub rms_diff1: f64,
    pub rms_roll3_mean: f64,
    pub median_frequency_diff1: f64,
    pub median_frequency_roll3_mean: f64,
    pub envelope_peak_diff1: f64,
    pub envelope_peak_roll3_mean: f64,
    pub peak_time_diff1: f64,
}

impl DynamicFeatures {
    /// Values in column order (see [`crate::DYNAMIC_FEATURE_NAMES`])
    pub fn values(&self) -> [f64; 15] {
        [
            self.rms_rel_base,
            self.rms_delta_base,
            self.median_frequency_rel_base,
            self.median_frequency_delta_base,
            self.envelope_peak_rel_base,
            self.envelope_peak_delta_base,
            self.rep_duration_rel_base,
            self.rep_duration_delta_base,
            self.rms_diff1,
            self.rms_roll3_mean,
            self.median_frequency_diff1,
            self.median_frequency_roll3_mean,
            self.envelope_peak_diff1,
            self.envelope_peak_roll3_mean,
            self.peak_time_diff1,
        ]
    }

    /// Rebuild from values in column order
    pub fn from_values(v: [f64; 15]) -> Self {
        Self {
            rms_rel_base: v[0],
            rms_delta_base: v[1],
            median_frequency_rel_base: v[2],
            median_frequency_delta_base: v[3],
            envelope_peak_rel_base: v[4],
            envelope_peak_delta_base: v[5],
            rep_duration_rel_base: v[6],
            rep_duration_delta_base: v[7],
            rms_diff1: v[8],
            rms_roll3_mean: v[9],
            median_frequency_diff1: v[10],
            median_frequency_roll3_mean: v[11],
            envelope_peak_diff1: v[12],
            envelope_peak_roll3_mean: v[13],
            peak_time_diff1: v[14],
        }
    }
}

/// A repetition with its derived columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRep {
    pub features: RepFeatures,
    pub dynamics: DynamicFeatures,
}

fn relative(value: f64, base: f64) -> f64 {
    value / (base + BASELINE_EPS)
}

/// Add baseline-relative and dynamic columns to the repetitions of one
/// recording. Output is sorted by repetition number.
pub fn add_baseline_features(reps: &[RepFeatures]) -> Vec<AugmentedRep> {
    let mut sorted = reps.to_vec();
    sorted.sort_by_key(|r| r.rep);

    let Some(base) = Baseline::from_sorted(&sorted) else {
        return Vec::new();
    };

    let column = |f: fn(&RepFeatures) -> f64| sorted.iter().map(f).collect::<Vec<_>>();
    let rms = column(|r| r.rms);
    let mdf = column(|r| r.median_frequency);
    let env = column(|r| r.envelope_peak);
    let peak_time = column(|r| r.peak_time);

    let rms_diff = diff1(&rms);
    let mdf_diff = diff1(&mdf);
    let env_diff = diff1(&env);
    let time_diff = diff1(&peak_time);
    let rms_roll = trailing_mean(&rms, ROLLING_WINDOW);
    let mdf_roll = trailing_mean(&mdf, ROLLING_WINDOW);
    let env_roll = trailing_mean(&env, ROLLING_WINDOW);

    sorted
        .iter()
        .enumerate()
        .map(|(i, r)| AugmentedRep {
            features: *r,
            dynamics: DynamicFeatures {
                rms_rel_base: relative(r.rms, base.rms),
                rms_delta_base: r.rms - base.rms,
                median_frequency_rel_base: relative(r.median_frequency, base.median_frequency),
                median_frequency_delta_base: r.median_frequency - base.median_frequency,
                envelope_peak_rel_base: relative(r.envelope_peak, base.envelope_peak),
                envelope_peak_delta_base: r.envelope_peak - base.envelope_peak,
                rep_duration_rel_base: relative(r.rep_duration, base.rep_duration),
                rep_duration_delta_base: r.rep_duration - base.rep_duration,
                rms_diff1: rms_diff[i],
                rms_roll3_mean: rms_roll[i],
                median_frequency_diff1: mdf_diff[i],
                median_frequency_roll3_mean: mdf_roll[i],
                envelope_peak_diff1: env_diff[i],
                envelope_peak_roll3_mean: env_roll[i],
                peak_time_diff1: time_diff[i],
            },
        })
        .collect()
}
