//! Master Dataset Builder
//!
//! Runs the per-recording pipeline over every manifest entry on the
//! blocking pool and assembles the labeled rows in manifest order.
//! Recordings that cannot contribute are skipped and reported, never fatal.

use std::collections::HashMap;
use std::sync::Arc;

use feature_engine::{label_rows, MasterDataset, RepFeatureRow};
use rep_segmentation::SegmentationConfig;
use serde::Serialize;
use signal_conditioner::{ConditioningConfig, RawSignal};
use storage::{ChannelLookup, LabelManifest, SignalSource};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::recording::process_signal;
use crate::PipelineError;

/// Why a recording contributed no rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    NoGroundTruth,
    FileNotFound,
    ChannelNotFound { available: Vec<String> },
    EmptySignal,
    Corrupt(String),
    ProcessingFailed(String),
    /// The worker died before reporting
    WorkerFailed(String),
}

impl SkipReason {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            SkipReason::NoGroundTruth => "no_ground_truth",
            SkipReason::FileNotFound => "file_not_found",
            SkipReason::ChannelNotFound { .. } => "channel_not_found",
            SkipReason::EmptySignal => "empty_signal",
            SkipReason::Corrupt(_) => "corrupt",
            SkipReason::ProcessingFailed(_) => "processing_failed",
            SkipReason::WorkerFailed(_) => "worker_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FileStatus {
    Processed {
        reps: usize,
        peaks: usize,
        windows_discarded: usize,
    },
    Skipped(SkipReason),
}

/// Outcome for one manifest entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file_id: String,
    pub failure_rep: Option<usize>,
    pub status: FileStatus,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub dataset: MasterDataset,
    /// One report per manifest entry, in manifest order
    pub files: Vec<FileReport>,
}

impl BatchResult {
    /// Recordings that went through the pipeline
    pub fn processed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Processed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.processed()
    }
}

/// Per-recording parameters shared by every worker
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub channel: String,
    pub conditioning: ConditioningConfig,
    pub segmentation: SegmentationConfig,
}

impl BatchSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            channel: config.data.channel.clone(),
            conditioning: config.conditioning.clone(),
            segmentation: config.segmentation.clone(),
        }
    }
}

fn skip_reason(lookup: ChannelLookup) -> Result<(Vec<f64>, f64), SkipReason> {
    match lookup {
        ChannelLookup::Found {
            samples,
            sampling_rate,
        } => Ok((samples, sampling_rate)),
        ChannelLookup::FileNotFound => Err(SkipReason::FileNotFound),
        ChannelLookup::ChannelNotFound { available } => {
            Err(SkipReason::ChannelNotFound { available })
        }
        ChannelLookup::Empty => Err(SkipReason::EmptySignal),
        ChannelLookup::Corrupt(reason) => Err(SkipReason::Corrupt(reason)),
    }
}

/// Load, process and label one recording
fn process_entry(
    source: &dyn SignalSource,
    file_id: &str,
    failure_rep: usize,
    settings: &BatchSettings,
) -> Result<(FileStatus, Vec<RepFeatureRow>), SkipReason> {
    let (samples, sampling_rate) = skip_reason(source.load(file_id, &settings.channel))?;
    let raw = RawSignal::new(file_id, settings.channel.as_str(), samples, sampling_rate)
        .with_failure_rep(Some(failure_rep));
    debug!(
        "{}: {:.1} s of {} at {} Hz",
        raw.file_id,
        raw.duration_seconds(),
        raw.channel_label,
        raw.sampling_rate
    );

    let out = process_signal(
        &raw.samples,
        raw.sampling_rate,
        &settings.conditioning,
        &settings.segmentation,
    )
    .map_err(|e| SkipReason::ProcessingFailed(e.to_string()))?;

    let rows = label_rows(&raw.file_id, &out.reps, failure_rep);
    let status = FileStatus::Processed {
        reps: rows.len(),
        peaks: out.peaks,
        windows_discarded: out.windows_discarded,
    };
    Ok((status, rows))
}

/// Build the master dataset for every entry of `manifest`.
///
/// Only configuration problems are errors. A worker that panics costs just
/// its own recording, and an empty result is left for the caller to judge.
pub async fn build_master_dataset(
    source: Arc<dyn SignalSource>,
    manifest: &LabelManifest,
    settings: &BatchSettings,
) -> Result<BatchResult, PipelineError> {
    settings.segmentation.validate()?;
    info!(
        "Building master dataset from {} manifest entries (channel {})",
        manifest.len(),
        settings.channel
    );

    let mut tasks = JoinSet::new();
    let mut in_flight = HashMap::new();
    let mut slots: Vec<Option<(FileReport, Vec<RepFeatureRow>)>> =
        vec![None; manifest.len()];

    for (index, entry) in manifest.entries().iter().enumerate() {
        let Some(failure_rep) = entry.failure_rep else {
            warn!("Skipping {}: no failure repetition in manifest", entry.id);
            slots[index] = Some((
                FileReport {
                    file_id: entry.id.clone(),
                    failure_rep: None,
                    status: FileStatus::Skipped(SkipReason::NoGroundTruth),
                },
                Vec::new(),
            ));
            continue;
        };

        let source = Arc::clone(&source);
        let settings = settings.clone();
        let file_id = entry.id.clone();
        let handle = tasks.spawn_blocking(move || {
            process_entry(source.as_ref(), &file_id, failure_rep, &settings)
        });
        in_flight.insert(handle.id(), (index, entry.id.clone(), failure_rep));
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        let (task_id, outcome) = match joined {
            Ok((task_id, outcome)) => (task_id, outcome),
            Err(e) => (e.id(), Err(SkipReason::WorkerFailed(e.to_string()))),
        };
        let Some((index, file_id, failure_rep)) = in_flight.remove(&task_id) else {
            continue;
        };
        let (status, rows) = match outcome {
            Ok((status, rows)) => {
                debug!("{}: {} labeled reps", file_id, rows.len());
                metrics::counter!("fatigue_files_processed_total").increment(1);
                if let FileStatus::Processed {
                    windows_discarded, ..
                } = status
                {
                    metrics::counter!("fatigue_windows_discarded_total")
                        .increment(windows_discarded as u64);
                }
                (status, rows)
            }
            Err(reason) => {
                warn!("Skipping {}: {:?}", file_id, reason);
                metrics::counter!("fatigue_files_skipped_total", "reason" => reason.as_label())
                    .increment(1);
                (FileStatus::Skipped(reason), Vec::new())
            }
        };
        slots[index] = Some((
            FileReport {
                file_id,
                failure_rep: Some(failure_rep),
                status,
            },
            rows,
        ));
    }

    let mut files = Vec::with_capacity(slots.len());
    let mut rows = Vec::new();
    for (report, file_rows) in slots.into_iter().flatten() {
        files.push(report);
        rows.extend(file_rows);
    }

    let dataset = MasterDataset::from_rows(rows);
    metrics::counter!("fatigue_rows_dropped_total").increment(dataset.dropped() as u64);
    info!(
        "Master dataset built: {} rows, {} dropped, {} of {} files skipped",
        dataset.len(),
        dataset.dropped(),
        files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Skipped(_)))
            .count(),
        files.len()
    );

    Ok(BatchResult { dataset, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRecording;
    use storage::{InMemorySignalSource, ManifestEntry, Recording};

    fn settings() -> BatchSettings {
        BatchSettings::from_config(&PipelineConfig::default())
    }

    fn entry(id: &str, failure_rep: Option<usize>) -> ManifestEntry {
        ManifestEntry {
            id: id.to_string(),
            failure_rep,
        }
    }

    fn synthetic(bursts: usize, seed: u64) -> Recording {
        Recording::single(
            "Emg_1",
            SyntheticRecording::new(bursts, 4).with_seed(seed).samples(),
            SyntheticRecording::SAMPLING_RATE,
        )
    }

    #[tokio::test]
    async fn test_rows_follow_manifest_order() {
        let mut source = InMemorySignalSource::new();
        source.insert("b", synthetic(6, 3));
        source.insert("a", synthetic(7, 5));
        let manifest = LabelManifest::new(vec![entry("b", Some(4)), entry("a", Some(5))]);

        let result = build_master_dataset(Arc::new(source), &manifest, &settings())
            .await
            .unwrap();

        assert_eq!(result.processed(), 2);
        assert_eq!(result.dataset.file_ids(), vec!["b", "a"]);
        // 6 bursts -> reps 2..=5, 7 bursts -> reps 2..=6
        assert_eq!(result.dataset.len(), 4 + 5);
        let labels_b: Vec<bool> = result.dataset.rows()[..4].iter().map(|r| r.is_fatigued).collect();
        assert_eq!(labels_b, vec![false, false, true, true]);
        let labels_a: Vec<bool> = result.dataset.rows()[4..].iter().map(|r| r.is_fatigued).collect();
        assert_eq!(labels_a, vec![false, false, false, true, true]);
    }

    #[tokio::test]
    async fn test_unusable_recordings_are_skipped() {
        let mut source = InMemorySignalSource::new();
        source.insert("ok", synthetic(6, 1));
        source.insert("other_channel", Recording::single("Emg_2", vec![0.0; 10], 1000.0));
        source.insert("empty", Recording::single("Emg_1", Vec::new(), 1000.0));
        source.insert("short", Recording::single("Emg_1", vec![0.5; 6], 1000.0));
        source.insert("unlabeled", synthetic(6, 2));
        let manifest = LabelManifest::new(vec![
            entry("ok", Some(4)),
            entry("absent", Some(4)),
            entry("other_channel", Some(4)),
            entry("empty", Some(4)),
            entry("short", Some(4)),
            entry("unlabeled", None),
        ]);

        let result = build_master_dataset(Arc::new(source), &manifest, &settings())
            .await
            .unwrap();

        let statuses: Vec<&FileStatus> = result.files.iter().map(|f| &f.status).collect();
        assert!(matches!(statuses[0], FileStatus::Processed { reps: 4, .. }));
        assert_eq!(*statuses[1], FileStatus::Skipped(SkipReason::FileNotFound));
        assert_eq!(
            *statuses[2],
            FileStatus::Skipped(SkipReason::ChannelNotFound {
                available: vec!["Emg_2".to_string()]
            })
        );
        assert_eq!(*statuses[3], FileStatus::Skipped(SkipReason::EmptySignal));
        assert!(matches!(
            statuses[4],
            FileStatus::Skipped(SkipReason::ProcessingFailed(_))
        ));
        assert_eq!(*statuses[5], FileStatus::Skipped(SkipReason::NoGroundTruth));
        assert_eq!(result.skipped(), 5);
        assert_eq!(result.dataset.file_ids(), vec!["ok"]);
    }

    /// Panics on one recording, serves the rest from memory
    struct PanickingSource {
        inner: InMemorySignalSource,
        poisoned: &'static str,
    }

    impl SignalSource for PanickingSource {
        fn load(&self, file_id: &str, channel: &str) -> ChannelLookup {
            if file_id == self.poisoned {
                panic!("reader crashed on {}", file_id);
            }
            self.inner.load(file_id, channel)
        }
    }

    #[tokio::test]
    async fn test_worker_panic_skips_only_its_recording() {
        let mut inner = InMemorySignalSource::new();
        inner.insert("a", synthetic(6, 3));
        inner.insert("c", synthetic(7, 5));
        let source = PanickingSource {
            inner,
            poisoned: "b",
        };
        let manifest = LabelManifest::new(vec![entry("a", Some(4)), entry("b", Some(4)), entry("c", Some(5))]);

        let result = build_master_dataset(Arc::new(source), &manifest, &settings())
            .await
            .unwrap();

        assert_eq!(result.files.len(), 3);
        assert_eq!(result.files[1].file_id, "b");
        assert!(matches!(
            &result.files[1].status,
            FileStatus::Skipped(SkipReason::WorkerFailed(_))
        ));
        assert_eq!(result.processed(), 2);
        assert_eq!(result.dataset.file_ids(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_invalid_segmentation_config_is_an_error() {
        let mut settings = settings();
        settings.segmentation.distance_seconds = -1.0;
        let manifest = LabelManifest::new(vec![entry("x", Some(3))]);
        let source: Arc<dyn SignalSource> = Arc::new(InMemorySignalSource::new());
        assert!(matches!(
            build_master_dataset(source, &manifest, &settings).await,
            Err(PipelineError::Segmentation(_))
        ));
    }
}
