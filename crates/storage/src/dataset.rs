//! Master Dataset Artifact
//!
//! Comma-separated, one row per repetition, with a header naming every
//! column. Columns are matched by name on read, so their order is free.

use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use feature_engine::{DynamicFeatures, MasterDataset, RepFeatureRow, RepFeatures, DYNAMIC_FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::StorageError;

const BASE_COLUMNS: [&str; 10] = [
    "file_id",
    "rep",
    "start",
    "end",
    "peak_index",
    "peak_time",
    "rms",
    "median_frequency",
    "envelope_peak",
    "rep_duration",
];

const LABEL_COLUMNS: [&str; 2] = ["failure_rep", "is_fatigued"];

/// Column names in written order
pub fn dataset_columns() -> Vec<&'static str> {
    BASE_COLUMNS
        .iter()
        .chain(DYNAMIC_FEATURE_NAMES.iter())
        .chain(LABEL_COLUMNS.iter())
        .copied()
        .collect()
}

/// One table row; field order matches [`dataset_columns`]
#[derive(Debug, Serialize, Deserialize)]
struct DatasetRecord {
    file_id: String,
    rep: usize,
    start: usize,
    end: usize,
    peak_index: usize,
    peak_time: f64,
    rms: f64,
    median_frequency: f64,
    envelope_peak: f64,
    rep_duration: f64,
    rms_rel_base: f64,
    rms_delta_base: f64,
    median_frequency_rel_base: f64,
    median_frequency_delta_base: f64,
    envelope_peak_rel_base: f64,
    envelope_peak_delta_base: f64,
    rep_duration_rel_base: f64,
    rep_duration_delta_base: f64,
    rms_diff1: f64,
    rms_roll3_mean: f64,
    median_frequency_diff1: f64,
    median_frequency_roll3_mean: f64,
    envelope_peak_diff1: f64,
    envelope_peak_roll3_mean: f64,
    peak_time_diff1: f64,
    failure_rep: usize,
    /// 1 for fatigued, 0 otherwise
    is_fatigued: u8,
}

impl From<&RepFeatureRow> for DatasetRecord {
    fn from(row: &RepFeatureRow) -> Self {
        let f = &row.features;
        let d = &row.dynamics;
        Self {
            file_id: row.file_id.clone(),
            rep: f.rep,
            start: f.start,
            end: f.end,
            peak_index: f.peak_index,
            peak_time: f.peak_time,
            rms: f.rms,
            median_frequency: f.median_frequency,
            envelope_peak: f.envelope_peak,
            rep_duration: f.rep_duration,
            rms_rel_base: d.rms_rel_base,
            rms_delta_base: d.rms_delta_base,
            median_frequency_rel_base: d.median_frequency_rel_base,
            median_frequency_delta_base: d.median_frequency_delta_base,
            envelope_peak_rel_base: d.envelope_peak_rel_base,
            envelope_peak_delta_base: d.envelope_peak_delta_base,
            rep_duration_rel_base: d.rep_duration_rel_base,
            rep_duration_delta_base: d.rep_duration_delta_base,
            rms_diff1: d.rms_diff1,
            rms_roll3_mean: d.rms_roll3_mean,
            median_frequency_diff1: d.median_frequency_diff1,
            median_frequency_roll3_mean: d.median_frequency_roll3_mean,
            envelope_peak_diff1: d.envelope_peak_diff1,
            envelope_peak_roll3_mean: d.envelope_peak_roll3_mean,
            peak_time_diff1: d.peak_time_diff1,
            failure_rep: row.failure_rep,
            is_fatigued: u8::from(row.is_fatigued),
        }
    }
}

impl DatasetRecord {
    fn into_row(self) -> Result<RepFeatureRow, String> {
        let is_fatigued = match self.is_fatigued {
            0 => false,
            1 => true,
            other => return Err(format!("invalid label {}", other)),
        };
        Ok(RepFeatureRow {
            features: RepFeatures {
                rep: self.rep,
                start: self.start,
                end: self.end,
                peak_index: self.peak_index,
                peak_time: self.peak_time,
                rms: self.rms,
                median_frequency: self.median_frequency,
                envelope_peak: self.envelope_peak,
                rep_duration: self.rep_duration,
            },
            dynamics: DynamicFeatures {
                rms_rel_base: self.rms_rel_base,
                rms_delta_base: self.rms_delta_base,
                median_frequency_rel_base: self.median_frequency_rel_base,
                median_frequency_delta_base: self.median_frequency_delta_base,
                envelope_peak_rel_base: self.envelope_peak_rel_base,
                envelope_peak_delta_base: self.envelope_peak_delta_base,
                rep_duration_rel_base: self.rep_duration_rel_base,
                rep_duration_delta_base: self.rep_duration_delta_base,
                rms_diff1: self.rms_diff1,
                rms_roll3_mean: self.rms_roll3_mean,
                median_frequency_diff1: self.median_frequency_diff1,
                median_frequency_roll3_mean: self.median_frequency_roll3_mean,
                envelope_peak_diff1: self.envelope_peak_diff1,
                envelope_peak_roll3_mean: self.envelope_peak_roll3_mean,
                peak_time_diff1: self.peak_time_diff1,
            },
            file_id: self.file_id,
            failure_rep: self.failure_rep,
            is_fatigued,
        })
    }
}

/// Write every row of `dataset` with a header line
pub fn write_master_dataset(path: impl AsRef<Path>, dataset: &MasterDataset) -> Result<(), StorageError> {
    let path = path.as_ref();
    let encode = |e: csv::Error| StorageError::SerializationError(e.to_string());
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(dataset_columns()).map_err(encode)?;
    for row in dataset.rows() {
        writer.serialize(DatasetRecord::from(row)).map_err(encode)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    std::fs::write(path, bytes).map_err(|e| StorageError::io(path, e))?;
    info!("Wrote {} dataset rows to {}", dataset.len(), path.display());
    Ok(())
}

/// Read a dataset written by [`write_master_dataset`]
pub fn read_master_dataset(path: impl AsRef<Path>) -> Result<MasterDataset, StorageError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let header = reader.headers().map_err(|e| StorageError::csv(path, e))?.clone();
    if header.is_empty() {
        return Err(StorageError::parse(path, 1, "dataset file is empty"));
    }
    if let Some(column) = dataset_columns().into_iter().find(|c| !header.iter().any(|h| h == *c)) {
        return Err(StorageError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let row = record
            .deserialize::<DatasetRecord>(Some(&header))
            .map_err(|e| e.to_string())
            .and_then(DatasetRecord::into_row)
            .map_err(|reason| StorageError::parse(path, line, reason))?;
        rows.push(row);
    }

    let dataset = MasterDataset::from_rows(rows);
    info!("Read {} dataset rows from {}", dataset.len(), path.display());
    Ok(dataset)
}
