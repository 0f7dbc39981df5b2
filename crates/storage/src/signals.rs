//! Raw Signal Sources
//!
//! A source answers "give me channel X of recording Y" with a
//! [`ChannelLookup`]. Missing or unreadable inputs are outcomes, not
//! errors, so one bad recording never aborts a batch.
//!
//! The directory source reads one `<id>.csv` per recording:
//!
//! ```text
//! sampling_rate;2000
//! Emg_1;Emg_2
//! 0.0012;-0.0031
//! ...
//! ```
//!
//! Without the `sampling_rate` line the header must contain a `time`
//! column, and the rate is estimated from it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use signal_conditioner::estimate_sampling_rate;
use tracing::debug;

use crate::StorageError;

const DELIMITER: u8 = b';';
const RATE_KEY: &str = "sampling_rate";
const TIME_COLUMN: &str = "time";

/// Outcome of looking up one channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelLookup {
    Found { samples: Vec<f64>, sampling_rate: f64 },
    FileNotFound,
    ChannelNotFound { available: Vec<String> },
    /// The channel exists but holds no samples
    Empty,
    Corrupt(String),
}

impl ChannelLookup {
    /// Short reason for logs and skip counters
    pub fn reason(&self) -> &'static str {
        match self {
            ChannelLookup::Found { .. } => "found",
            ChannelLookup::FileNotFound => "file_not_found",
            ChannelLookup::ChannelNotFound { .. } => "channel_not_found",
            ChannelLookup::Empty => "empty_signal",
            ChannelLookup::Corrupt(_) => "corrupt",
        }
    }
}

/// Anything that can serve raw channels by recording id
pub trait SignalSource: Send + Sync {
    fn load(&self, file_id: &str, channel: &str) -> ChannelLookup;
}

/// All channels of one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub sampling_rate: f64,
    pub labels: Vec<String>,
    /// One sample vector per label
    pub channels: Vec<Vec<f64>>,
}

impl Recording {
    pub fn single(label: &str, samples: Vec<f64>, sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            labels: vec![label.to_string()],
            channels: vec![samples],
        }
    }

    pub fn channel(&self, label: &str) -> Option<&[f64]> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.channels[i].as_slice())
    }

    fn lookup(&self, channel: &str) -> ChannelLookup {
        match self.channel(channel) {
            None => ChannelLookup::ChannelNotFound {
                available: self.labels.clone(),
            },
            Some([]) => ChannelLookup::Empty,
            Some(samples) => ChannelLookup::Found {
                samples: samples.to_vec(),
                sampling_rate: self.sampling_rate,
            },
        }
    }
}

fn parse_row(record: &StringRecord, width: usize) -> Result<Vec<f64>, String> {
    let line = record.position().map_or(0, |p| p.line());
    if record.len() != width {
        return Err(format!(
            "line {}: expected {} values, found {}",
            line,
            width,
            record.len()
        ));
    }
    record
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| format!("line {}: invalid sample {:?}", line, v))
        })
        .collect()
}

/// Parse the text of one recording file
pub fn parse_recording(text: &str) -> Result<Recording, String> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let mut records = reader
        .records()
        .filter(|r| r.as_ref().map_or(true, |r| r.iter().any(|f| !f.is_empty())))
        .map(|r| r.map_err(|e| e.to_string()));

    let first = records.next().ok_or("file is empty")??;
    let (declared_rate, header) = if first.get(0).is_some_and(|key| key.eq_ignore_ascii_case(RATE_KEY)) {
        let value = first.get(1).unwrap_or("");
        let rate = value
            .parse::<f64>()
            .map_err(|_| format!("invalid sampling rate {:?}", value))?;
        let header = records.next().ok_or("missing channel header")??;
        (Some(rate), header)
    } else {
        (None, first)
    };

    let mut labels: Vec<String> = header.iter().map(str::to_string).collect();
    let mut channels = vec![Vec::new(); labels.len()];
    for record in records {
        for (column, value) in channels.iter_mut().zip(parse_row(&record?, labels.len())?) {
            column.push(value);
        }
    }

    let sampling_rate = match declared_rate {
        Some(rate) => rate,
        None => {
            let time_index = labels
                .iter()
                .position(|l| l.eq_ignore_ascii_case(TIME_COLUMN))
                .ok_or("no sampling_rate line and no time column")?;
            let time = channels.remove(time_index);
            labels.remove(time_index);
            estimate_sampling_rate(&time).ok_or("time column does not give a sampling rate")?
        }
    };
    if !(sampling_rate > 0.0) || !sampling_rate.is_finite() {
        return Err(format!("sampling rate must be positive, got {}", sampling_rate));
    }

    Ok(Recording {
        sampling_rate,
        labels,
        channels,
    })
}

/// Write a recording in the directory source format
pub fn write_recording(path: impl AsRef<Path>, recording: &Recording) -> Result<(), StorageError> {
    let path = path.as_ref();
    let len = recording.channels.iter().map(Vec::len).max().unwrap_or(0);
    if recording.channels.iter().any(|c| c.len() != len) {
        return Err(StorageError::SerializationError(
            "channels of a recording must have equal length".to_string(),
        ));
    }

    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_writer(Vec::new());
    let encode = |e: csv::Error| StorageError::SerializationError(e.to_string());
    writer
        .write_record([RATE_KEY, recording.sampling_rate.to_string().as_str()])
        .map_err(encode)?;
    writer.write_record(&recording.labels).map_err(encode)?;
    for i in 0..len {
        writer
            .write_record(recording.channels.iter().map(|c| c[i].to_string()))
            .map_err(encode)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    std::fs::write(path, bytes).map_err(|e| StorageError::io(path, e))
}

/// Reads `<root>/<id>.csv`
#[derive(Debug, Clone)]
pub struct DirectorySignalSource {
    root: PathBuf,
}

impl DirectorySignalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, file_id: &str) -> PathBuf {
        self.root.join(format!("{}.csv", file_id))
    }
}

impl SignalSource for DirectorySignalSource {
    fn load(&self, file_id: &str, channel: &str) -> ChannelLookup {
        let path = self.path_for(file_id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ChannelLookup::FileNotFound,
            Err(e) => return ChannelLookup::Corrupt(e.to_string()),
        };
        match parse_recording(&text) {
            Ok(recording) => {
                debug!(
                    "Loaded {} ({} channels at {} Hz)",
                    path.display(),
                    recording.labels.len(),
                    recording.sampling_rate
                );
                recording.lookup(channel)
            }
            Err(reason) => ChannelLookup::Corrupt(reason),
        }
    }
}

/// Recordings held in memory, keyed by id
#[derive(Debug, Clone, Default)]
pub struct InMemorySignalSource {
    recordings: HashMap<String, Recording>,
}

impl InMemorySignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_id: &str, recording: Recording) {
        self.recordings.insert(file_id.to_string(), recording);
    }
}

impl SignalSource for InMemorySignalSource {
    fn load(&self, file_id: &str, channel: &str) -> ChannelLookup {
        match self.recordings.get(file_id) {
            Some(recording) => recording.lookup(channel),
            None => ChannelLookup::FileNotFound,
        }
    }
}
