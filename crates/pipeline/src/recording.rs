//! Per-Recording Feature Pipeline
//!
//! condition -> segment -> extract -> baseline augmentation, for one
//! channel. Shared by dataset building and single-file inference.

use feature_engine::{add_baseline_features, extract, AugmentedRep};
use rep_segmentation::{segment, SegmentationConfig};
use signal_conditioner::{condition, ConditioningConfig};
use tracing::debug;

use crate::PipelineError;

/// Features of every accepted repetition of one recording
#[derive(Debug, Clone)]
pub struct RecordingFeatures {
    /// Envelope peaks that passed the distance and prominence checks
    pub peaks: usize,
    /// Interior windows dropped by the length check
    pub windows_discarded: usize,
    /// Augmented repetitions, sorted by repetition number
    pub reps: Vec<AugmentedRep>,
}

impl RecordingFeatures {
    /// Too few peaks to delimit any repetition
    pub fn insufficient_peaks(&self) -> bool {
        self.peaks < rep_segmentation::MIN_PEAKS
    }
}

/// Run the feature pipeline on one raw channel
pub fn process_signal(
    samples: &[f64],
    sampling_rate: f64,
    conditioning: &ConditioningConfig,
    segmentation: &SegmentationConfig,
) -> Result<RecordingFeatures, PipelineError> {
    let conditioned = condition(samples, sampling_rate, conditioning)?;
    let segmented = segment(&conditioned, segmentation)?;

    let raw = extract(&conditioned, &segmented.windows, &conditioned.time_axis())?;
    let reps = add_baseline_features(&raw);
    debug!(
        "{} peaks, {} windows kept, {} discarded",
        segmented.peaks.len(),
        reps.len(),
        segmented.discarded
    );

    Ok(RecordingFeatures {
        peaks: segmented.peaks.len(),
        windows_discarded: segmented.discarded,
        reps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRecording;

    #[test]
    fn test_six_bursts_give_four_reps() {
        let rec = SyntheticRecording::new(6, 4).samples();
        let out = process_signal(
            &rec,
            SyntheticRecording::SAMPLING_RATE,
            &ConditioningConfig::default(),
            &SegmentationConfig::default(),
        )
        .unwrap();

        assert_eq!(out.peaks, 6);
        assert_eq!(out.windows_discarded, 0);
        let reps: Vec<usize> = out.reps.iter().map(|r| r.features.rep).collect();
        assert_eq!(reps, vec![2, 3, 4, 5]);
        assert!(out.reps.iter().all(|r| r.features.is_finite()));
    }

    #[test]
    fn test_two_bursts_give_no_reps() {
        let rec = SyntheticRecording::new(2, 2).samples();
        let out = process_signal(
            &rec,
            SyntheticRecording::SAMPLING_RATE,
            &ConditioningConfig::default(),
            &SegmentationConfig::default(),
        )
        .unwrap();
        assert!(out.insufficient_peaks());
        assert!(out.reps.is_empty());
    }

    #[test]
    fn test_short_signal_is_an_error() {
        let err = process_signal(
            &[0.1; 8],
            1000.0,
            &ConditioningConfig::default(),
            &SegmentationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Conditioning(_)));
    }
}
